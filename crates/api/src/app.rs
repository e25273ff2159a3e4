use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use domain::services::{MessagingGateway, ReplyGenerator, StaticReplyGenerator};
use shared::jwt::{JwtConfig, JwtError};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, require_user_auth, trace_id,
    RateLimiterState,
};
use crate::routes::{
    agents, auth, campaigns, conversations, events, health, leads, me, orders, plans, products,
    stats, webhooks,
};
use crate::services::{
    AuthService, CampaignSender, ChatCompletionClient, EventHub, LoggingGateway, MessagePipeline,
    OrderWorkflow, Outbox, PipelineSettings, WhatsAppCloudGateway,
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("Invalid JWT keys: {0}")]
    Jwt(#[from] JwtError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// The two outside services the backend talks to.
#[derive(Clone)]
pub struct Integrations {
    pub gateway: Arc<dyn MessagingGateway>,
    pub replies: Arc<dyn ReplyGenerator>,
}

impl Integrations {
    /// WhatsApp Cloud API and the chat-completion backend when enabled;
    /// a logging gateway and the fallback reply otherwise.
    pub fn from_config(config: &Config) -> Result<Self, AppInitError> {
        let gateway: Arc<dyn MessagingGateway> = if config.whatsapp.enabled {
            Arc::new(WhatsAppCloudGateway::new(&config.whatsapp)?)
        } else {
            tracing::warn!("WhatsApp delivery disabled, outbound messages are only logged");
            Arc::new(LoggingGateway)
        };

        let replies: Arc<dyn ReplyGenerator> = if config.assistant.enabled {
            Arc::new(ChatCompletionClient::new(&config.assistant)?)
        } else {
            tracing::warn!("Assistant disabled, agents answer with their fallback reply");
            Arc::new(StaticReplyGenerator)
        };

        Ok(Self { gateway, replies })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub jwt: Arc<JwtConfig>,
    pub events: EventHub,
    pub auth: AuthService,
    pub pipeline: MessagePipeline,
    pub orders: OrderWorkflow,
    pub outbox: Outbox,
    pub campaigns: CampaignSender,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
}

impl AppState {
    pub fn new(
        config: Config,
        pool: PgPool,
        integrations: Integrations,
    ) -> Result<Self, AppInitError> {
        let config = Arc::new(config);

        // Keys from env vars usually carry literal `\n`.
        let private_key = config.jwt.private_key.replace("\\n", "\n");
        let public_key = config.jwt.public_key.replace("\\n", "\n");
        let jwt = Arc::new(JwtConfig::from_rsa_pem(
            &private_key,
            &public_key,
            config.jwt.access_token_expiry_secs,
            config.jwt.leeway_secs,
        )?);

        let rate_limiter = if config.security.rate_limit_per_minute > 0 {
            Some(Arc::new(RateLimiterState::new(
                config.security.rate_limit_per_minute,
            )))
        } else {
            None
        };

        let events = EventHub::default();
        let pipeline = MessagePipeline::new(
            pool.clone(),
            integrations.gateway.clone(),
            integrations.replies.clone(),
            events.clone(),
            PipelineSettings {
                reply_cost: config.assistant.reply_cost,
                history_limit: config.assistant.history_limit,
            },
        );

        Ok(Self {
            auth: AuthService::new(pool.clone(), jwt.clone()),
            orders: OrderWorkflow::new(pool.clone(), integrations.gateway.clone(), events.clone()),
            outbox: Outbox::new(pool.clone(), integrations.gateway.clone()),
            campaigns: CampaignSender::new(
                pool.clone(),
                integrations.gateway,
                events.clone(),
                config.campaigns.clone(),
            ),
            pipeline,
            events,
            jwt,
            rate_limiter,
            config,
            pool,
        })
    }
}

/// Builds the router with the integrations selected by `config`.
pub fn create_app(config: Config, pool: PgPool) -> Result<Router, AppInitError> {
    let integrations = Integrations::from_config(&config)?;
    let state = AppState::new(config, pool, integrations)?;
    Ok(router(state))
}

/// Builds the router around prepared state.
pub fn router(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Auth is the outer route layer so the rate limiter sees the tenant.
    let tenant_routes = Router::new()
        .route("/api/v1/me", get(me::get_me))
        .route("/api/v1/agents", post(agents::create_agent).get(agents::list_agents))
        .route(
            "/api/v1/agents/:id",
            get(agents::get_agent)
                .patch(agents::update_agent)
                .delete(agents::delete_agent),
        )
        .route(
            "/api/v1/products",
            post(products::create_product).get(products::list_products),
        )
        .route(
            "/api/v1/products/:id",
            patch(products::update_product).delete(products::delete_product),
        )
        .route("/api/v1/orders", get(orders::list_orders))
        .route("/api/v1/orders/:id", get(orders::get_order))
        .route("/api/v1/orders/:id/validate", post(orders::validate_order))
        .route("/api/v1/orders/:id/reject", post(orders::reject_order))
        .route("/api/v1/orders/:id/cancel", post(orders::cancel_order))
        .route("/api/v1/orders/:id/deliver", post(orders::deliver_order))
        .route("/api/v1/leads", get(leads::list_leads))
        .route("/api/v1/leads/:id", patch(leads::update_lead))
        .route("/api/v1/conversations", get(conversations::list_conversations))
        .route(
            "/api/v1/conversations/:id/messages",
            get(conversations::list_messages),
        )
        .route(
            "/api/v1/conversations/:id/pause",
            post(conversations::pause_conversation),
        )
        .route(
            "/api/v1/conversations/:id/resume",
            post(conversations::resume_conversation),
        )
        .route(
            "/api/v1/conversations/:id/reply",
            post(conversations::send_reply),
        )
        .route(
            "/api/v1/campaigns",
            post(campaigns::create_campaign).get(campaigns::list_campaigns),
        )
        .route("/api/v1/campaigns/:id", get(campaigns::get_campaign))
        .route(
            "/api/v1/campaigns/:id/schedule",
            post(campaigns::schedule_campaign),
        )
        .route("/api/v1/campaigns/:id/cancel", post(campaigns::cancel_campaign))
        .route("/api/v1/stats", get(stats::get_stats))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_auth,
        ));

    // The event stream stays open for hours; it is authenticated but kept
    // out of the request timeout and the rate limiter.
    let stream_routes = Router::new()
        .route("/api/v1/events", get(events::stream_events))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_auth,
        ));

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler))
        .route("/api/v1/plans", get(plans::list_plans))
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .route(
            "/api/v1/webhooks/whatsapp/:agent_id",
            post(webhooks::receive_whatsapp),
        );

    let timed = Router::new()
        .merge(public_routes)
        .merge(tenant_routes)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )));

    Router::new()
        .merge(timed)
        .merge(stream_routes)
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
