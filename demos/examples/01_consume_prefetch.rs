use std::sync::Arc;
use std::time::Duration;

use tagbid::{Correlator, Partner};
use tagbid_demos::{demo_config, get_gateway};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let observer = Arc::new(|c: &Correlator, elapsed: Duration| {
        println!("prefetch for {c} finished in {elapsed:?}");
    });
    let partner = Partner::builder()
        .config(demo_config())
        .gateway(get_gateway())
        .observer(observer)
        .build()?;

    // Resolve before the prefetch answers: the call waits and is then served from it.
    let handle = partner.prefetch("page-2", ["top-banner", "sidebar", "footer"]);
    let first = partner.resolve("page-2", ["top-banner"]).await?;
    handle.wait().await;
    println!("first: {} slot(s), state {:?}", first.demand.len(), partner.prefetch_state());

    let rest = partner.resolve("page-2", ["sidebar", "footer"]).await?;
    println!("rest: {} slot(s), state {:?}", rest.demand.len(), partner.prefetch_state());

    // Everything prefetched was consumed; this one goes to the network.
    let again = partner.resolve("page-2", ["top-banner"]).await?;
    println!("again: {} slot(s), cached {}", again.demand.len(), partner.cached_len());
    Ok(())
}
