use std::path::PathBuf;

use tokio::sync::oneshot;

use crate::buffer::{BufferState, FlushReport, TaskHandle, WriteTask};
use crate::controller::VolumeEvent;
use crate::error::{IndexRequestError, Result};
use crate::identity::{ContentIdentifier, ResolvedIdentity};
use crate::tree::IndexedRoot;
use crate::types::RequesterId;
use crate::watch::{IndexOutcome, IndexRequest, ProbedRequest};

pub(crate) type IndexReply = oneshot::Sender<std::result::Result<IndexOutcome, IndexRequestError>>;

pub(crate) enum MinerEvent {
    Index {
        request: IndexRequest,
        reply: IndexReply,
    },
    IndexProbed {
        result: std::result::Result<ProbedRequest, IndexRequestError>,
        reply: IndexReply,
    },
    ReleaseRequester {
        requester: RequesterId,
        reply: oneshot::Sender<Vec<PathBuf>>,
    },
    PushTask {
        task: WriteTask,
        reply: oneshot::Sender<TaskHandle>,
    },
    Flush {
        reason: String,
        reply: oneshot::Sender<Option<oneshot::Receiver<FlushReport>>>,
    },
    BufferState {
        file: PathBuf,
        reply: oneshot::Sender<BufferState>,
    },
    Identify {
        file: PathBuf,
        reply: oneshot::Sender<Result<ContentIdentifier>>,
    },
    IdentityResolved {
        result: Result<ResolvedIdentity>,
        reply: oneshot::Sender<Result<ContentIdentifier>>,
    },
    Roots {
        reply: oneshot::Sender<Vec<IndexedRoot>>,
    },
    Volume(VolumeEvent),
}
