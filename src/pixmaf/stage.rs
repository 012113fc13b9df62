//! Sequencing of the refinement stages.

/// Refinement stages per forward pass.
pub const STAGE_COUNT: usize = 4;

/// Progress of one forward pass through the refinement stages.
///
/// `Init -> SampleGrid -> SampleMesh(1) -> ... -> SampleMesh(STAGE_COUNT - 1) -> Done`
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RefinementState {
    /// Evaluating the mean parameters.
    #[default]
    Init,
    /// Stage 0 samples a fixed grid.
    SampleGrid,
    /// Later stages sample the previous mesh.
    SampleMesh { stage: usize },
    Done,
}

impl RefinementState {
    /// The state after this one.
    pub fn next(self) -> Self {
        match self {
            Self::Init => Self::SampleGrid,
            Self::SampleGrid => Self::mesh_or_done(1),
            Self::SampleMesh { stage } => Self::mesh_or_done(stage + 1),
            Self::Done => Self::Done,
        }
    }

    /// The index of the stage, if the state samples features.
    pub fn stage(&self) -> Option<usize> {
        match self {
            Self::SampleGrid => Some(0),
            Self::SampleMesh { stage } => Some(*stage),
            _ => None,
        }
    }

    fn mesh_or_done(stage: usize) -> Self {
        if stage < STAGE_COUNT {
            Self::SampleMesh { stage }
        } else {
            Self::Done
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn sequence() {
        use super::*;

        let states = std::iter::successors(Some(RefinementState::default()), |state| {
            (*state != RefinementState::Done).then(|| state.next())
        })
        .collect::<Vec<_>>();

        assert_eq!(
            states,
            [
                RefinementState::Init,
                RefinementState::SampleGrid,
                RefinementState::SampleMesh { stage: 1 },
                RefinementState::SampleMesh { stage: 2 },
                RefinementState::SampleMesh { stage: 3 },
                RefinementState::Done,
            ]
        );
        assert_eq!(
            states.iter().filter_map(RefinementState::stage).collect::<Vec<_>>(),
            [0, 1, 2, 3]
        );
        assert_eq!(RefinementState::Done.next(), RefinementState::Done);
    }
}
