//! Resolution of configured stage ids to live host handles.
//!
//! Host objects may not exist when configuration is read, so resolution
//! happens once at connect time. Binding is all-or-nothing: a single
//! missing stage fails the whole resolution and no partial set is ever
//! handed to the controller.

use ss_core::{Real, StageId};

use crate::error::ResolutionFault;
use crate::ratio::RatioTable;

/// A secondary stage resolved to a host handle.
///
/// The id is captured at resolution time and used for every command and
/// log line afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct StageBinding<H> {
    id: StageId,
    handle: H,
}

impl<H> StageBinding<H> {
    pub fn new(id: StageId, handle: H) -> Self {
        Self { id, handle }
    }

    pub fn id(&self) -> &StageId {
        &self.id
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }
}

/// Host object registry, queried once at connect time.
pub trait Registry {
    /// Handle used to read the primary heater.
    type Primary;
    /// Handle of a secondary stage.
    type Handle;

    fn lookup_primary(&self, id: &StageId) -> Option<Self::Primary>;

    fn lookup_stage(&self, id: &StageId) -> Option<Self::Handle>;
}

/// Everything the controller needs once connected.
#[derive(Debug)]
pub struct ResolvedStages<P, H> {
    pub primary_id: StageId,
    pub primary: P,
    pub bindings: Vec<(StageBinding<H>, Real)>,
}

/// Resolve each id through `lookup`, in order.
///
/// # Errors
///
/// `ResolutionFault::StageNotFound` for the first id `lookup` misses.
pub fn resolve<'a, H, I, F>(
    stage_ids: I,
    mut lookup: F,
) -> Result<Vec<StageBinding<H>>, ResolutionFault>
where
    I: IntoIterator<Item = &'a StageId>,
    F: FnMut(&StageId) -> Option<H>,
{
    stage_ids
        .into_iter()
        .map(|id| match lookup(id) {
            Some(handle) => Ok(StageBinding::new(id.clone(), handle)),
            None => Err(ResolutionFault::StageNotFound {
                stage_id: id.clone(),
            }),
        })
        .collect()
}

/// Resolve the primary heater handle.
pub fn resolve_primary<P, F>(primary_id: &StageId, lookup: F) -> Result<P, ResolutionFault>
where
    F: FnOnce(&StageId) -> Option<P>,
{
    lookup(primary_id).ok_or_else(|| ResolutionFault::PrimaryNotFound {
        stage_id: primary_id.clone(),
    })
}

/// Resolve the primary and every stage in `table` against `registry`.
pub fn resolve_all<R: Registry + ?Sized>(
    primary_id: &StageId,
    table: &RatioTable,
    registry: &R,
) -> Result<ResolvedStages<R::Primary, R::Handle>, ResolutionFault> {
    let primary = resolve_primary(primary_id, |id| registry.lookup_primary(id))?;
    tracing::info!("StageSync heater: {} initialized", primary_id);

    let bound = resolve(table.stage_ids(), |id| registry.lookup_stage(id))?;
    let bindings = bound
        .into_iter()
        .zip(table.iter().map(|entry| entry.ratio))
        .collect();

    Ok(ResolvedStages {
        primary_id: primary_id.clone(),
        primary,
        bindings,
    })
}
