use rust_decimal::Decimal;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use event_registration::clock::SystemClock;
use event_registration::config::AppConfig;
use event_registration::domain::catalog::Product;
use event_registration::domain::event_info::EventInfo;
use event_registration::domain::order::{OrderStatus, OrderUpdates, PaymentMethod, PaymentProvider};
use event_registration::domain::principal::{OrganizationContext, Principal, Role};
use event_registration::metrics::{self, Metrics};
use event_registration::outbox::serialize_event;
use event_registration::services::{OrderManagementService, RegistrationOptions, RegistrationService};
use event_registration::store::{
    InMemoryStore, InMemoryUserDirectory, PgStore, RegistrationStore, UnitOfWork,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    // Initialize structured logging with environment-based filtering
    // RUST_LOG wins over LOG_FILTER, e.g. RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    tracing::info!("🚀 Starting event registration engine");

    // === 1. Initialize Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    if config.metrics.enabled {
        // Start metrics HTTP server in background thread
        let metrics_registry = Arc::new(metrics.registry().clone());
        let port = config.metrics.port;
        std::thread::spawn(move || {
            let system = actix_web::rt::System::new();
            if let Err(e) = system.block_on(metrics::start_metrics_server(metrics_registry, port)) {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    }

    // === 2. Select the store ===
    let store: Arc<dyn RegistrationStore> = match &config.database {
        Some(database) => {
            tracing::info!("Connecting to Postgres...");
            let store = PgStore::connect(&database.url, database.max_connections).await?;
            store.migrate().await?;
            Arc::new(store)
        }
        None => {
            tracing::info!("DATABASE_URL not set, using the in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };

    let users = Arc::new(InMemoryUserDirectory::new());
    let clock = Arc::new(SystemClock);
    let registrations = RegistrationService::new(store.clone(), users.clone(), clock.clone(), metrics.clone());
    let orders = OrderManagementService::new(store.clone(), clock, metrics.clone());

    // === 3. Seed a small event: one seat, one mandatory fee ===
    let organization_id = uuid::Uuid::now_v7();
    let mut event = EventInfo::new(organization_id, "Rust workshop");
    event.max_participants = 1;
    let fee = event.add_product(Product::new(event.id, "Workshop fee", Decimal::from(100)).mandatory(1));
    let lunch = event.add_product(Product::new(event.id, "Lunch", Decimal::from(25)));
    let event_id = event.id;

    let mut seed = UnitOfWork::new(None);
    seed.save_event(event);
    store.commit(seed).await?;

    let ada = users.add("Ada Lovelace", "ada@example.com").await;
    let alan = users.add("Alan Turing", "alan@example.com").await;
    let admin = Principal::user(uuid::Uuid::now_v7()).with_role(Role::Admin);
    let admin_org = OrganizationContext::of(organization_id);
    let no_org = OrganizationContext::none();

    // === 4. Demonstrate the registration lifecycle ===
    tracing::info!("📝 Registering the first participant");
    let first = registrations
        .create_registration(&Principal::user(ada), &no_org, event_id, ada, RegistrationOptions::with_order())
        .await?;
    let order_id = first
        .orders()
        .first()
        .map(|o| o.id)
        .ok_or_else(|| anyhow::anyhow!("expected an order for the mandatory fee"))?;
    tracing::info!("✅ Registration {} is {} with order {}", first.id, first.status(), order_id);

    tracing::info!("📝 Registering a second participant on a full event");
    let second = registrations
        .create_registration(&Principal::user(alan), &no_org, event_id, alan, RegistrationOptions::with_order())
        .await?;
    tracing::info!("✅ Registration {} is {} with {} orders", second.id, second.status(), second.orders().len());

    if let Err(e) = registrations
        .create_registration(&Principal::user(ada), &no_org, event_id, ada, RegistrationOptions::default())
        .await
    {
        tracing::info!("✅ Second registration for the same user rejected ({:?}): {}", e.kind(), e);
    }

    // === 5. Demonstrate order management ===
    let updates = OrderUpdates::builder().add_product(lunch, 1).build()?;
    let order = orders.update_order(&Principal::user(ada), &no_org, order_id, &updates).await?;
    tracing::info!("✅ Order {} now totals {}", order.id, order.total_amount());

    let invoice = PaymentMethod {
        id: uuid::Uuid::now_v7(),
        name: "Invoice by email".to_string(),
        provider: PaymentProvider::EmailInvoice,
    };
    orders
        .set_payment_method(&Principal::user(ada), &no_org, order_id, Some(invoice))
        .await?;

    orders.transition_order(&admin, &admin_org, order_id, OrderStatus::Verified, None).await?;
    orders
        .transition_order(&admin, &admin_org, order_id, OrderStatus::Invoiced, Some("Invoice sent"))
        .await?;

    if let Err(e) = orders.update_order(&admin, &admin_org, order_id, &updates).await {
        tracing::info!("✅ Invoiced order is immutable ({:?}): {}", e.kind(), e);
    }

    let refund = orders.create_refund_order(&admin, &admin_org, order_id).await?;
    tracing::info!("✅ Refund order {} totals {}", refund.id, refund.total_amount());

    let listed = orders.list_orders(&Principal::user(ada), &no_org, first.id).await?;
    for order in &listed {
        tracing::info!(
            order_id = %order.id,
            status = %order.status(),
            total = %order.total_amount(),
            has_fee = order.contains_product(fee),
            "Order summary"
        );
    }

    // === 6. Dump the registration's orders as JSON ===
    let summary = serialize_event(&listed)?;
    tracing::debug!("Orders for registration {}: {}", first.id, summary);

    tracing::info!("🎉 Demo complete!");
    Ok(())
}
