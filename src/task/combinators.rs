//! Parallel and sequenced composition of pour futures.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::warn;

use super::{PourFuture, PourOutcome};

/// What a parallel future does to its other children when one fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParallelPolicy {
    /// Fail the aggregate and leave siblings running.
    #[default]
    LeaveRunning,
    /// Fail the aggregate and cancel every sibling still running.
    CancelSiblings,
}

/// Run all `children` concurrently.
///
/// Succeeds once every child succeeds. The first failing child fails the
/// aggregate with its reason. A child cancelled from outside resolves the
/// aggregate as `Cancelled`. Cancelling the aggregate cancels every child
/// that is still running, even after the aggregate has failed.
pub fn parallel(name: &str, children: Vec<PourFuture>, policy: ParallelPolicy) -> PourFuture {
    let children: Arc<[PourFuture]> = children.into();
    let adopted = Arc::clone(&children);

    let future = PourFuture::new(name, move |parent| {
        if children.is_empty() {
            parent.succeed();
            return;
        }
        let remaining = Arc::new(AtomicUsize::new(children.len()));
        for child in children.iter() {
            let parent = parent.clone();
            let remaining = Arc::clone(&remaining);
            let siblings = Arc::clone(&children);
            child.on_complete(move |child, outcome| match outcome {
                PourOutcome::Succeeded => {
                    if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                        parent.succeed();
                    }
                }
                PourOutcome::Failed(reason) => {
                    warn!("{}: {} failed: {}", parent.name(), child.name(), reason);
                    if parent.fail(reason) && policy == ParallelPolicy::CancelSiblings {
                        for sibling in siblings.iter().filter(|s| !s.same_as(child)) {
                            sibling.cancel();
                        }
                    }
                }
                PourOutcome::Cancelled => {
                    if !parent.is_cancel_requested() {
                        parent.finish(PourOutcome::Cancelled);
                    }
                }
            });
        }
        // No ordering is implied between children.
        for child in children.iter() {
            child.start();
        }
    });

    future.adopt(&adopted);
    future
}

/// Run `children` one after another, each starting only after the previous
/// one succeeded. A failure aborts the rest; cancelling the sequence
/// cancels the child currently running and every child not yet started.
pub fn sequenced(name: &str, children: Vec<PourFuture>) -> PourFuture {
    let children: Arc<[PourFuture]> = children.into();
    let steps = Arc::clone(&children);

    let future = PourFuture::new(name, move |parent| {
        run_step(parent.clone(), steps, 0);
    });
    future.adopt(&children);
    future
}

fn run_step(parent: PourFuture, children: Arc<[PourFuture]>, idx: usize) {
    let Some(child) = children.get(idx).cloned() else {
        parent.succeed();
        return;
    };
    if parent.is_cancel_requested() {
        return;
    }
    child.on_complete(move |_, outcome| match outcome {
        PourOutcome::Succeeded => run_step(parent, children, idx + 1),
        PourOutcome::Failed(reason) => {
            parent.fail(reason);
        }
        PourOutcome::Cancelled => {
            if !parent.is_cancel_requested() {
                parent.finish(PourOutcome::Cancelled);
            }
        }
    });
    // A parent cancel reaches this child whether it lands before start()
    // (the child is left Cancelled and start() is a no-op) or after.
    child.start();
}
