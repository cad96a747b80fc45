use axum::{routing::{get, post}, Router};
use invoice_dedup_rust::{api, create_pool, AppConfig, DeduplicationFacade, PgRecordStore, RecordStore};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 本地时间格式，级别由 RUST_LOG 控制
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置 (权重/阈值非法时在这里失败)
    let config = AppConfig::load()?;
    info!("Starting server with config: {:?}", config);

    // 创建数据库连接池
    let pool = create_pool(&config.database).await?;
    info!("Database pool created");

    let store: Arc<dyn RecordStore> = Arc::new(PgRecordStore::new(pool));
    let facade = Arc::new(DeduplicationFacade::new(store, &config.dedup)?);

    // 构建路由
    let dedup_routes = Router::new()
        .route("/api/dedup/file", post(api::check_file))
        .route("/api/dedup/file/batch", post(api::check_file_batch))
        .route("/api/dedup/invoice", post(api::check_invoice))
        .route("/api/dedup/invoice/status", post(api::update_invoice_status))
        .route("/api/dedup/rescan", post(api::rescan_tenant))
        .with_state(facade);

    let app = Router::new()
        .route("/health", get(api::health_check))
        .merge(dedup_routes)
        .layer(ServiceBuilder::new());

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/dedup/file            - exact file check");
    info!("  POST /api/dedup/file/batch      - exact file check (batch)");
    info!("  POST /api/dedup/invoice         - semantic invoice check");
    info!("  POST /api/dedup/invoice/status  - persist verdict");
    info!("  POST /api/dedup/rescan          - tenant rescan");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
