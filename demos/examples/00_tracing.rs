use tagbid::Partner;
use tagbid_demos::{demo_config, get_gateway};
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Suggested: RUST_LOG=info,tagbid=debug,tagbid_kraken=debug
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
        .try_init();

    let partner = Partner::builder()
        .config(demo_config())
        .gateway(get_gateway())
        .build()?;

    partner
        .prefetch("page-1", ["top-banner", "sidebar"])
        .wait()
        .await;

    let report = partner.resolve("page-1", ["top-banner", "footer"]).await?;
    for (slot, record) in report.demand.iter() {
        println!("{slot}: {:?}", record.demand());
    }
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    Ok(())
}
