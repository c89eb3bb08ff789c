#![warn(missing_docs)]

//! Cloudflare worker tracking League of Legends summoner names and when they become available.

use worker::{
    event, Context, Env, MessageBatch, MessageExt, Request, Response, Router, ScheduleContext,
    ScheduledEvent,
};

pub mod api;
pub mod db;
pub mod error;
pub mod init;
pub mod regions;
pub mod riot;
pub mod store;
pub mod summoners;
pub mod webjob;
pub mod with;

pub use error::{Error, Result};

use crate::init::{init_logging, AppState, BINDING_QUEUE_WEBJOB};
use crate::webjob::RefreshWindow;

/// Cloudflare fetch request handler.
#[event(fetch, respond_with_errors)]
pub async fn fetch(req: Request, env: Env, _ctx: Context) -> worker::Result<Response> {
    init_logging(&env);

    let router = Router::new();
    router
        .get_async("/summoner", api::summoner_get)
        .get_async("/summoners", api::summoners_get)
        .run(req, env)
        .await
}

/// Cloudflare queue handler, refreshing one summoner per message.
#[event(queue)]
pub async fn queue(
    message_batch: MessageBatch<webjob::Task>,
    env: Env,
    _ctx: Context,
) -> worker::Result<()> {
    init_logging(&env);

    let state = AppState::new(&env)?;
    let mut errors = Vec::new();
    for msg in message_batch.messages()? {
        log::info!("Handling webjob task: `{:?}`.", msg.body());
        match webjob::handle(&state.summoners, msg.body()).await {
            Ok(outcome) => {
                log::debug!("Webjob task done: {:?}.", outcome);
                msg.ack();
            }
            Err(e) => {
                log::error!("Webjob task `{:?}` failed: {}", msg.body(), e);
                msg.retry();
                errors.push(e);
            }
        }
    }

    log::info!("Handling webjob tasks complete. Errors: {:?}", errors);
    errors
        .is_empty()
        .then_some(())
        .ok_or(worker::Error::RustError(format!("{:?}", errors)))
}

/// Cloudflare cron handler, queueing summoners whose availability date is near.
#[event(scheduled)]
pub async fn scheduled(event: ScheduledEvent, env: Env, _ctx: ScheduleContext) {
    init_logging(&env);

    let cron = event.cron();
    let Some(window) = RefreshWindow::from_cron(&cron) else {
        log::error!("No refresh window for cron `{}`.", cron);
        return;
    };
    if let Err(e) = produce(&env, window, event.schedule() as i64).await {
        log::error!("{:?} refresh failed: {}", window, e);
    }
}

async fn produce(env: &Env, window: RefreshWindow, now: i64) -> Result<()> {
    let state = AppState::new(env)?;
    let queue = env.queue(BINDING_QUEUE_WEBJOB).map_err(|e| {
        Error::Config(format!(
            "Missing queue binding `{}`: {}",
            BINDING_QUEUE_WEBJOB, e
        ))
    })?;
    let count = webjob::refresh(&state.summoners, window, now, |task| {
        let queue = &queue;
        async move {
            queue
                .send(task)
                .await
                .map_err(|e| Error::persistence("enqueue", e))
        }
    })
    .await?;
    log::info!("{:?} refresh queued {} summoners.", window, count);
    Ok(())
}
