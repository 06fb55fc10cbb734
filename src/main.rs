use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_ticketing::config::{Config, StoreBackend};
use order_ticketing::domain::order::{NewOrder, OrderError, OrderLifecycleService};
use order_ticketing::domain::product::{ProductCategory, ProductForm, ProductService};
use order_ticketing::metrics::{self, Metrics};
use order_ticketing::remote::HttpCustomerDirectory;
use order_ticketing::store::{
    self, InMemoryOrderStore, InMemoryProductCatalog, OrderStore, PgOrderStore, PgProductCatalog,
    ProductCatalog,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO, override with RUST_LOG (e.g. RUST_LOG=debug)
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_ticketing=debug")),
        )
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("🚀 Starting order ticketing service");
    tracing::info!(
        store = ?config.store_backend,
        admission_timeout_ms = config.admission_timeout.as_millis() as u64,
        customer_api = %config.customer_root_api,
        "Configuration loaded"
    );

    // === 1. Stores ===
    let (orders, catalog): (Arc<dyn OrderStore>, Arc<dyn ProductCatalog>) = match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;
            let pool = store::postgres::connect(url, config.db_max_connections).await?;
            (
                Arc::new(PgOrderStore::new(pool.clone())),
                Arc::new(PgProductCatalog::new(pool)),
            )
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, nothing will be persisted");
            let catalog = Arc::new(InMemoryProductCatalog::new());
            (
                Arc::new(InMemoryOrderStore::with_catalog(catalog.clone())),
                catalog,
            )
        }
    };

    // === 2. Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // actix-web needs its own system; keep it off the main runtime
    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let system = actix_web::rt::System::new();
        if let Err(e) = system.block_on(metrics::start_metrics_server(metrics_registry, metrics_port)) {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    // === 3. Customer directory + lifecycle service ===
    let customers = Arc::new(
        HttpCustomerDirectory::new(config.customer_root_api.clone(), config.customer_timeout)?
            .with_metrics(metrics.clone()),
    );
    let service = OrderLifecycleService::new(
        orders,
        catalog.clone(),
        customers,
        config.admission_timeout,
    )
    .with_metrics(metrics.clone());
    let products = ProductService::new(catalog);

    // === 4. Demonstrate the order lifecycle ===
    tracing::info!("📝 Demonstrating order admission and lifecycle");

    let burger = products
        .create_product(
            ProductForm::new("X-Burger", "Beef burger with cheese", ProductCategory::Lanche, 22.9)
                .with_image("https://images.example/x-burger.png"),
        )
        .await?;
    let soda = products
        .create_product(ProductForm::new("Refrigerante", "Lata 350ml", ProductCategory::Bebida, 6.5))
        .await?;
    let combo = products
        .create_product(
            ProductForm::new("Combo X", "X-Burger + Refrigerante", ProductCategory::Combo, 26.9)
                .with_combo_products([burger, soda]),
        )
        .await?;

    let first = service
        .create_order(NewOrder::new(26.9, [combo]).with_national_id("12345678900"))
        .await?;
    let second = service.create_order(NewOrder::new(29.4, [burger, soda])).await?;
    tracing::info!(
        first_ticket = first.ticket_number,
        second_ticket = second.ticket_number,
        "✅ Two orders admitted"
    );

    service.advance_to_preparing(first.order_id).await?;

    match service.advance_to_preparing(first.order_id).await {
        Err(e @ OrderError::PreconditionFailed { .. }) => {
            tracing::info!(status = e.status_code().as_u16(), "Repeated transition rejected: {}", e)
        }
        other => anyhow::bail!("expected a precondition failure, got {other:?}"),
    }
    match service.advance_to_done(second.order_id).await {
        Err(e @ OrderError::PreconditionFailed { .. }) => {
            tracing::info!(status = e.status_code().as_u16(), "Skipped step rejected: {}", e)
        }
        other => anyhow::bail!("expected a precondition failure, got {other:?}"),
    }

    service.advance_to_done(first.order_id).await?;

    let board = service.get_orders_to_follow().await?;
    tracing::info!("📋 Orders to follow:\n{}", serde_json::to_string_pretty(&board)?);

    service.advance_to_delivered(first.order_id).await?;

    let paying = service.create_paying_order(NewOrder::new(6.5, [soda])).await?;
    service.confirm_payment(paying.order_id, "demo-payment-1").await?;
    tracing::info!(order_id = paying.order_id, "✅ Payment confirmed, order queued for the kitchen");

    tracing::info!("🎉 Demo complete, metrics on :{} (Ctrl+C to exit)", config.metrics_port);
    tokio::signal::ctrl_c().await?;

    Ok(())
}
