use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use log::{debug, trace, error, info};

use crate::accumulator::StreamAccumulator;
use crate::sink::SummarySink;
use crate::transport::Transport;
use crate::{RequestOutcome, TerminationReason};

/// Commands handled by the controller loop
pub(crate) enum ControllerCommand
{   Start
    {   body: crate::request::SummarizeRequest
      , sink: Box<dyn SummarySink>
      , reply: oneshot::Sender<
          Result<RequestHandle, crate::error::Error>
        >
    }
  , IsActive
    {   reply: oneshot::Sender<bool>
    }
  , /// Sent by a request task before its sink sees `on_done`
    Finished
    {   id: u64
    }
  , Shutdown
    {   reply: oneshot::Sender<()>
    }
}

/// The one request a controller may be running
#[derive(Debug, Clone)]
pub(crate) struct ActiveRequest
{   pub(crate) id: u64
  , pub(crate) token: CancellationToken
}

#[derive(Debug, Clone)]
pub(crate) enum RequestState
{   Idle
  , Active(ActiveRequest)
}

/// Loop-owned controller state; nothing else touches it
struct ControllerState
{   state: RequestState
  , next_id: u64
  , transport: Arc<dyn Transport>
  , shutdown: CancellationToken
}

impl ControllerState
{   fn new(
      transport: Arc<dyn Transport>
    , shutdown: CancellationToken
    ) -> Self
    {   debug!("Creating ControllerState");
        ControllerState
        {   state: RequestState::Idle
          , next_id: 0
          , transport
          , shutdown
        }
    }

    fn is_active(&self) -> bool
    {   matches!(self.state, RequestState::Active(_))
    }

    fn handle_start(
      &mut self
    , body: crate::request::SummarizeRequest
    , sink: Box<dyn SummarySink>
    , cmd_tx: mpsc::UnboundedSender<ControllerCommand>
    ) -> Result<RequestHandle, crate::error::Error>
    {   if let RequestState::Active(active) = &self.state
        {   debug!("Rejecting start: request {} active", active.id);
            return Err(crate::error::Error::RequestAlreadyActive);
        }

        self.next_id += 1;
        let id = self.next_id;
        let token = self.shutdown.child_token();
        let (outcome_tx, outcome_rx) = watch::channel(None);

        let sink = ReportingSink
        {   id
          , inner: sink
          , cmd_tx
          , reported: false
        };
        tokio::spawn(run_request(
          self.transport.clone(),
          body,
          token.clone(),
          sink,
          outcome_tx
        ));

        info!("Request {} started", id);
        self.state = RequestState::Active(ActiveRequest
        {   id
          , token: token.clone()
        });

        Ok(RequestHandle
        {   id
          , token
          , outcome: outcome_rx
        })
    }

    fn handle_finished(&mut self, id: u64)
    {   match &self.state
        {   RequestState::Active(active) if active.id == id => {
              debug!("Request {} finished, controller idle", id);
              self.state = RequestState::Idle;
            }
          , _ => {
              trace!("Ignoring stale finish for request {}", id);
            }
        }
    }

    fn cancel_active(&self)
    {   if let RequestState::Active(active) = &self.state
        {   debug!("Cancelling request {}", active.id);
            active.token.cancel();
        }
    }
}

/// Handle to one started request
#[derive(Debug, Clone)]
pub struct RequestHandle
{   id: u64
  , token: CancellationToken
  , outcome: watch::Receiver<Option<RequestOutcome>>
}

impl RequestHandle
{   pub fn id(&self) -> u64
    {   self.id
    }

    /// Abort the connection and any pending read.
    /// Safe to call any number of times, before or after completion.
    pub fn cancel(&self)
    {   trace!("Cancel requested for request {}", self.id);
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool
    {   self.token.is_cancelled()
    }

    /// Whether the request has reached a terminal state
    pub fn is_finished(&self) -> bool
    {   self.outcome.borrow().is_some()
    }

    /// Cancel through the same path as `cancel` once `deadline`
    /// elapses, unless the request ends first
    pub fn cancel_after(&self, deadline: Duration)
    {   let token = self.token.clone();
        let mut outcome = self.outcome.clone();
        let id = self.id;
        tokio::spawn(async move {
          tokio::select!
          { _ = token.cancelled() => {}
          , _ = outcome.wait_for(Option::is_some) => {}
          , _ = tokio::time::sleep(deadline) => {
              info!("Request {} hit its deadline", id);
              token.cancel();
            }
          }
        });
    }

    /// Wait for the terminal outcome. By the time this returns the
    /// controller is idle again and accepts a new `start`.
    pub async fn finished(&self)
      -> Result<RequestOutcome, crate::error::Error>
    {   let mut outcome = self.outcome.clone();
        let done = outcome
          .wait_for(Option::is_some)
          .await
          .map_err(|_| {
            error!("Request {} ended without an outcome", self.id);
            crate::error::Error::Disconnected
          })?
          .clone();
        done.ok_or(crate::error::Error::Disconnected)
    }
}

/// Wraps the caller's sink so the controller hears about
/// termination before the caller does
struct ReportingSink
{   id: u64
  , inner: Box<dyn SummarySink>
  , cmd_tx: mpsc::UnboundedSender<ControllerCommand>
  , reported: bool
}

impl ReportingSink
{   fn report_finished(&mut self)
    {   if self.reported
        {   return;
        }
        self.reported = true;
        if self
          .cmd_tx
          .send(ControllerCommand::Finished { id: self.id })
          .is_err()
        {   debug!("Controller gone before request {} ended", self.id);
        }
    }
}

impl SummarySink for ReportingSink
{   fn on_update(&mut self, text: &str)
    {   if self.reported
        {   return;
        }
        self.inner.on_update(text);
    }

    fn on_done(&mut self, reason: &TerminationReason)
    {   if self.reported
        {   debug!("Duplicate on_done for request {}", self.id);
            return;
        }
        self.report_finished();
        self.inner.on_done(reason);
    }
}

impl Drop for ReportingSink
{   fn drop(&mut self)
    {   self.report_finished();
    }
}

/// One request: connect, read, report. Owns the connection.
async fn run_request(
  transport: Arc<dyn Transport>
, body: crate::request::SummarizeRequest
, token: CancellationToken
, mut sink: ReportingSink
, outcome_tx: watch::Sender<Option<RequestOutcome>>
)
{   let id = sink.id;
    debug!("Request {} opening connection", id);

    let opened = tokio::select!
    { biased;
      _ = token.cancelled() => None
    , result = transport.open(body) => Some(result)
    };

    let outcome = match opened
    {   Some(Ok(stream)) => {
          trace!("Request {} streaming", id);
          StreamAccumulator::new()
            .consume(stream, &token, &mut sink)
            .await
        }
      , Some(Err(e)) => {
          error!("Request {} failed to connect: {}", id, e);
          let reason = TerminationReason::NetworkError(e.detail());
          sink.on_done(&reason);
          RequestOutcome
          {   text: String::new()
            , reason
          }
        }
      , None => {
          debug!("Request {} cancelled while connecting", id);
          let reason = TerminationReason::Cancelled;
          sink.on_done(&reason);
          RequestOutcome
          {   text: String::new()
            , reason
          }
        }
    };

    info!("Request {} ended: {}", id, outcome.reason);
    drop(sink);
    let _ = outcome_tx.send(Some(outcome));
}

/// Public API: owns the controller loop
pub struct RequestController
{   cmd_tx: mpsc::UnboundedSender<ControllerCommand>
  , shutdown: CancellationToken
  , _task: tokio::task::JoinHandle<()>
}

impl RequestController
{   /// Controller talking HTTP to the configured endpoint
    pub fn new(
      config: &crate::config::SummarizerConfig
    ) -> Result<Self, crate::error::Error>
    {   let transport = crate::transport::HttpTransport::new(config)?;
        Ok(RequestController::with_transport(Arc::new(transport)))
    }

    /// Create and spawn a controller over any transport
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self
    {   debug!("Creating RequestController");
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let weak_tx = cmd_tx.downgrade();
        let loop_shutdown = shutdown.clone();
        let _task = tokio::spawn(async move {
          run_controller_loop(cmd_rx, weak_tx, transport, loop_shutdown)
            .await
        });

        RequestController
        {   cmd_tx
          , shutdown
          , _task
        }
    }

    /// Start streaming a summary into `sink`.
    ///
    /// Fails with a usage error if the params are invalid or a
    /// request is already active; cancel and await the previous
    /// handle's `finished` first.
    pub async fn start(
      &self
    , params: crate::request::RequestParams
    , sink: impl SummarySink
    ) -> Result<RequestHandle, crate::error::Error>
    {   let body = params.into_body()?;
        debug!("start queuing request ({} chars)", body.content.len());
        let (reply_tx, reply_rx) = oneshot::channel();

        self.cmd_tx
          .send(ControllerCommand::Start
          {   body
            , sink: Box::new(sink)
            , reply: reply_tx
          })
          .map_err(|_| {
            error!("Controller channel closed");
            crate::error::Error::Disconnected
          })?;

        reply_rx.await.map_err(|_| crate::error::Error::Disconnected)?
    }

    /// Cancel the request behind `handle`. Idempotent.
    pub fn cancel(&self, handle: &RequestHandle)
    {   debug!("cancel for request {}", handle.id);
        handle.cancel();
    }

    pub async fn is_active(&self)
      -> Result<bool, crate::error::Error>
    {   let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
          .send(ControllerCommand::IsActive { reply: reply_tx })
          .map_err(|_| crate::error::Error::Disconnected)?;
        reply_rx.await.map_err(|_| crate::error::Error::Disconnected)
    }

    /// Cancel anything active and stop the loop
    pub async fn shutdown(self)
      -> Result<(), crate::error::Error>
    {   debug!("Shutting down RequestController");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
          .send(ControllerCommand::Shutdown { reply: reply_tx })
          .map_err(|_| {
            error!("Controller already shut down");
            crate::error::Error::Disconnected
          })?;
        reply_rx.await.map_err(|_| crate::error::Error::Disconnected)
    }
}

impl Drop for RequestController
{   fn drop(&mut self)
    {   self.shutdown.cancel();
    }
}

/// Main controller loop.
///
/// Commands are handled one at a time, so the single-active-request
/// check and the state change it guards cannot interleave.
async fn run_controller_loop(
  mut cmd_rx: mpsc::UnboundedReceiver<ControllerCommand>
, weak_tx: mpsc::WeakUnboundedSender<ControllerCommand>
, transport: Arc<dyn Transport>
, shutdown: CancellationToken
)
{   debug!("Starting controller loop");
    let mut state = ControllerState::new(transport, shutdown);

    loop
    { match cmd_rx.recv().await
      {   Some(ControllerCommand::Start { body, sink, reply }) => {
            let result = match weak_tx.upgrade()
            {   Some(cmd_tx) => state.handle_start(body, sink, cmd_tx)
              , None => Err(crate::error::Error::Disconnected)
            };
            // caller dropped `start` before the reply; nobody owns the
            // handle, so the request must not stay active
            if let Err(Ok(orphan)) = reply.send(result)
            {   debug!("Start caller gone, cancelling request {}", orphan.id);
                orphan.cancel();
            }
          }
        , Some(ControllerCommand::IsActive { reply }) => {
            let _ = reply.send(state.is_active());
          }
        , Some(ControllerCommand::Finished { id }) => {
            state.handle_finished(id);
          }
        , Some(ControllerCommand::Shutdown { reply }) => {
            state.cancel_active();
            let _ = reply.send(());
            info!("Controller shutting down");
            break;
          }
        , None => {
            debug!("Command channel closed");
            state.cancel_active();
            break;
          }
      }
    }
}
