use storefront::{configuration::Settings, startup::Application, telemetry::{get_subscriber, init_subscriber}};

#[actix_web::main]
async fn main() -> anyhow::Result<()>{
    let subscriber = get_subscriber("storefront".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber)?;

    let settings = Settings::get()?;

    let application = Application::build(settings).await?;
    tracing::info!("Listening on {}:{}", application.host, application.port);
    application.run_until_stopped().await?;
    Ok(())
}
