//! Off-thread extraction
//!
//! Extraction blocks on file and process queries. Hosts with an event loop can
//! hand a request to [`spawn_extraction`] and poll or wait on the returned
//! [`PendingIcon`]; batch callers can use [`extract_batch`], which spreads
//! independent requests over the rayon thread pool.

use crate::error::Result;
use crate::extractor::{ExtractionRequest, IconExtractor};
use crate::locator::ModuleLocator;
use crate::reader::IconResourceReader;
use rayon::prelude::*;
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Result of an extraction running on a worker thread
#[derive(Debug)]
pub struct PendingIcon {
    receiver: mpsc::Receiver<Result<Vec<u8>>>,
    handle: Option<JoinHandle<()>>,
}

impl PendingIcon {
    /// Block until the extraction finishes
    ///
    /// A panic on the worker thread is resumed on the caller's thread.
    pub fn wait(mut self) -> Result<Vec<u8>> {
        match self.receiver.recv() {
            Ok(result) => result,
            Err(mpsc::RecvError) => self.resume_worker_panic(),
        }
    }

    /// Take the result if the extraction has finished
    ///
    /// Returns `None` while the worker is still running. Once a result has been
    /// taken, later calls keep returning `None`.
    pub fn try_take(&mut self) -> Option<Result<Vec<u8>>> {
        match self.receiver.try_recv() {
            Ok(result) => {
                // The worker exits right after sending
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
                Some(result)
            }
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => match self.handle.take() {
                Some(handle) if handle.is_finished() => {
                    if let Err(payload) = handle.join() {
                        std::panic::resume_unwind(payload);
                    }
                    None
                }
                still_running => {
                    self.handle = still_running;
                    None
                }
            },
        }
    }

    fn resume_worker_panic(&mut self) -> ! {
        match self.handle.take().map(JoinHandle::join) {
            Some(Err(payload)) => std::panic::resume_unwind(payload),
            _ => panic!("extraction worker exited without a result"),
        }
    }
}

/// Run `request` on a dedicated thread with the platform extractor
pub fn spawn_extraction(request: ExtractionRequest) -> PendingIcon {
    spawn_extraction_with(Arc::new(IconExtractor::new()), request)
}

/// Run `request` on a dedicated thread with a shared extractor
pub fn spawn_extraction_with<L, R>(
    extractor: Arc<IconExtractor<L, R>>,
    request: ExtractionRequest,
) -> PendingIcon
where
    L: ModuleLocator + Send + Sync + 'static,
    R: IconResourceReader + Send + Sync + 'static,
{
    let (sender, receiver) = mpsc::sync_channel(1);

    let handle = thread::spawn(move || {
        debug!("Worker extracting icon from {}", request.selector);
        let result = extractor.extract(&request);
        // The receiver may already be gone; the result is simply discarded then
        let _ = sender.send(result);
    });

    PendingIcon {
        receiver,
        handle: Some(handle),
    }
}

/// Run independent requests in parallel with the platform extractor
///
/// Results are returned in the order of `requests`.
pub fn extract_batch(requests: &[ExtractionRequest]) -> Vec<Result<Vec<u8>>> {
    extract_batch_with(&IconExtractor::new(), requests)
}

/// Run independent requests in parallel with the given extractor
pub fn extract_batch_with<L, R>(
    extractor: &IconExtractor<L, R>,
    requests: &[ExtractionRequest],
) -> Vec<Result<Vec<u8>>>
where
    L: ModuleLocator + Sync,
    R: IconResourceReader + Sync,
{
    debug!("Extracting {} icons in parallel", requests.len());
    requests
        .par_iter()
        .map(|request| extractor.extract(request))
        .collect()
}
