//! Shot loop shared by the samplers.

use tracing::{info, warn};

use crate::callbacks::{Callback, Control, SamplerView};
use crate::error::{SamplerError, SamplerResult};

/// Outcome of [`crate::SubsetSampler::run`] and [`crate::DirectSampler::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Shots completed by this call.
    pub shots: u64,
    /// A callback requested the stop.
    pub stopped_early: bool,
}

/// A sampler that can walk the protocol once per shot.
pub(crate) trait ShotWalk: SamplerView {
    /// Walk one shot, recording it in the tree.
    fn walk(&mut self, callbacks: &mut [&mut dyn Callback]) -> SamplerResult<()>;

    /// Count a fully walked shot.
    fn complete_shot(&mut self);
}

/// Run up to `n_shots` shots of `sampler`.
///
/// Every `on_protocol_end` hook is called after each shot; the run stops when
/// any of them returns [`Control::Stop`]. A failed shot ends the run with
/// [`SamplerError::Aborted`] carrying the number of completed shots.
pub(crate) fn run_shots<S: ShotWalk>(
    sampler: &mut S,
    kind: &'static str,
    n_shots: u64,
    callbacks: &mut [&mut dyn Callback],
) -> SamplerResult<RunSummary> {
    info!(sampler = kind, n_shots, "sampling started");
    for cb in callbacks.iter_mut() {
        cb.on_sampler_begin(&*sampler);
    }

    let mut summary = RunSummary {
        shots: 0,
        stopped_early: false,
    };
    for _ in 0..n_shots {
        for cb in callbacks.iter_mut() {
            cb.on_protocol_begin(&*sampler);
        }
        if let Err(e) = sampler.walk(callbacks) {
            let shots_completed = sampler.shots_completed();
            warn!(sampler = kind, shots_completed, error = %e, "sampling aborted");
            return Err(SamplerError::Aborted {
                shots_completed,
                source: Box::new(e),
            });
        }
        sampler.complete_shot();
        summary.shots += 1;

        let mut stop = false;
        for cb in callbacks.iter_mut() {
            stop |= cb.on_protocol_end(&*sampler) == Control::Stop;
        }
        if stop {
            summary.stopped_early = true;
            break;
        }
    }

    for cb in callbacks.iter_mut() {
        cb.on_sampler_end(&*sampler);
    }
    info!(
        sampler = kind,
        shots = summary.shots,
        stopped_early = summary.stopped_early,
        stats = %sampler.current_stats(),
        "sampling finished"
    );
    Ok(summary)
}
