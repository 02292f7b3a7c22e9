use deadpool_postgres::Pool;
use std::sync::Arc;
use crate::config::Config;
use crate::error::Result;
use crate::gateway::{self, SupportGateway};
use crate::middleware_layer::rate_limit::LoginThrottle;
use crate::services::responder::{Responder, RuleBasedResponder};
use crate::ws::broker::RoomBroker;

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool.
    pub db: Pool,
    /// The application's configuration.
    pub config: Config,
    /// The real-time room broker.
    pub broker: Arc<RoomBroker>,
    /// The external support gateway client.
    pub gateway: Arc<dyn SupportGateway>,
    /// The automated backend answering user messages.
    pub responder: Arc<dyn Responder>,
    /// Failed-login accounting for the login throttle.
    pub login_throttle: LoginThrottle,
}

impl AppState {
    /// Creates a new `AppState`, connecting the pool and applying the
    /// schema before the server starts accepting requests.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = crate::db::create_pool(&config.database_url)?;
        crate::db::run_migrations(&db).await?;
        tracing::info!("PostgreSQL pool initialized");

        let broker = Arc::new(RoomBroker::new());
        tracing::info!("Room broker initialized");

        let gateway = gateway::from_config(config);

        Ok(AppState {
            db,
            config: config.clone(),
            broker,
            gateway,
            responder: Arc::new(RuleBasedResponder),
            login_throttle: LoginThrottle::new(),
        })
    }
}
