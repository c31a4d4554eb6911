use crate::models::{ListingContent, ListingMetrics};
use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

/// Bullet step completes only when exactly this many bullets are chosen.
pub const REQUIRED_BULLETS: usize = 5;

/// The four wizard screens in their canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptimizeStep {
    Title,
    Bullet,
    Description,
    Preview,
}

impl OptimizeStep {
    pub const ALL: [OptimizeStep; 4] = [
        OptimizeStep::Title,
        OptimizeStep::Bullet,
        OptimizeStep::Description,
        OptimizeStep::Preview,
    ];

    fn index(self) -> usize {
        match self {
            OptimizeStep::Title => 0,
            OptimizeStep::Bullet => 1,
            OptimizeStep::Description => 2,
            OptimizeStep::Preview => 3,
        }
    }
}

#[derive(Debug, Clone)]
pub enum WizardEvent {
    /// Begin a fresh run: snapshot the original listing, clear all progress.
    StartRun {
        asin: String,
        hero_keyword: String,
        original: ListingContent,
        title_seed: Option<String>,
    },
    /// Pick one of the generated title candidates. Completes Title.
    SelectTitle(usize),
    /// Replace the chosen bullet set. Completes Bullet iff exactly
    /// `REQUIRED_BULLETS` indices are given, un-completes it otherwise.
    SetBulletSelection(Vec<usize>),
    /// Pick one of the generated description candidates. Completes
    /// Description.
    SelectDescription(usize),
    /// Navigate to a step, subject to the gating rule.
    GoTo(OptimizeStep),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("no active optimization run")]
    NoActiveRun,
    #[error("step {0:?} is locked until earlier steps complete")]
    StepLocked(OptimizeStep),
    #[error("candidate index {index} out of range for {step:?} ({len} available)")]
    CandidateOutOfRange {
        step: OptimizeStep,
        index: usize,
        len: usize,
    },
    #[error("preview requires title, bullets, and description to be complete")]
    PreviewIncomplete,
}

/// One optimization run: the original snapshot, the generated candidates,
/// the user's choices, and which steps those choices have completed.
#[derive(Debug, Clone)]
pub struct OptimizationRun {
    pub id: Uuid,
    pub asin: String,
    pub hero_keyword: String,
    pub original: ListingContent,
    pub title_candidates: Vec<String>,
    pub bullet_candidates: Vec<String>,
    pub description_candidates: Vec<String>,
    chosen_title: Option<usize>,
    chosen_bullets: Vec<usize>,
    chosen_description: Option<usize>,
    completed: BTreeSet<OptimizeStep>,
    cached_analysis: Option<ListingMetrics>,
    current: OptimizeStep,
}

/// Wizard state machine. Pure: the HTTP layer feeds it events and reads the
/// resulting state; no IO happens here.
#[derive(Debug, Clone, Default)]
pub struct WizardState {
    run: Option<OptimizationRun>,
}

impl WizardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(&self) -> Option<&OptimizationRun> {
        self.run.as_ref()
    }

    pub fn current_step(&self) -> Option<OptimizeStep> {
        self.run.as_ref().map(|run| run.current)
    }

    /// Gating rule: a step is reachable iff it is the first step, it is
    /// already completed, or every earlier step is completed.
    pub fn step_available(&self, step: OptimizeStep) -> bool {
        let Some(run) = &self.run else {
            return false;
        };
        if step == OptimizeStep::Title || run.completed.contains(&step) {
            return true;
        }
        OptimizeStep::ALL[..step.index()]
            .iter()
            .all(|earlier| run.completed.contains(earlier))
    }

    pub fn is_completed(&self, step: OptimizeStep) -> bool {
        self.run
            .as_ref()
            .is_some_and(|run| run.completed.contains(&step))
    }

    pub fn transition(&mut self, event: WizardEvent) -> Result<(), WizardError> {
        match event {
            WizardEvent::StartRun {
                asin,
                hero_keyword,
                original,
                title_seed,
            } => {
                let title_candidates = title_seed.into_iter().collect();
                self.run = Some(OptimizationRun {
                    id: Uuid::new_v4(),
                    asin,
                    hero_keyword,
                    original,
                    title_candidates,
                    bullet_candidates: Vec::new(),
                    description_candidates: Vec::new(),
                    chosen_title: None,
                    chosen_bullets: Vec::new(),
                    chosen_description: None,
                    completed: BTreeSet::new(),
                    cached_analysis: None,
                    current: OptimizeStep::Title,
                });
                Ok(())
            }
            WizardEvent::SelectTitle(index) => {
                let run = self.run.as_mut().ok_or(WizardError::NoActiveRun)?;
                if index >= run.title_candidates.len() {
                    return Err(WizardError::CandidateOutOfRange {
                        step: OptimizeStep::Title,
                        index,
                        len: run.title_candidates.len(),
                    });
                }
                run.chosen_title = Some(index);
                run.completed.insert(OptimizeStep::Title);
                Ok(())
            }
            WizardEvent::SetBulletSelection(indices) => {
                let run = self.run.as_mut().ok_or(WizardError::NoActiveRun)?;
                if let Some(&bad) = indices
                    .iter()
                    .find(|&&index| index >= run.bullet_candidates.len())
                {
                    return Err(WizardError::CandidateOutOfRange {
                        step: OptimizeStep::Bullet,
                        index: bad,
                        len: run.bullet_candidates.len(),
                    });
                }
                let complete = indices.len() == REQUIRED_BULLETS;
                run.chosen_bullets = indices;
                if complete {
                    run.completed.insert(OptimizeStep::Bullet);
                } else {
                    run.completed.remove(&OptimizeStep::Bullet);
                }
                Ok(())
            }
            WizardEvent::SelectDescription(index) => {
                let run = self.run.as_mut().ok_or(WizardError::NoActiveRun)?;
                if index >= run.description_candidates.len() {
                    return Err(WizardError::CandidateOutOfRange {
                        step: OptimizeStep::Description,
                        index,
                        len: run.description_candidates.len(),
                    });
                }
                run.chosen_description = Some(index);
                run.completed.insert(OptimizeStep::Description);
                Ok(())
            }
            WizardEvent::GoTo(step) => {
                if self.run.is_none() {
                    return Err(WizardError::NoActiveRun);
                }
                if !self.step_available(step) {
                    return Err(WizardError::StepLocked(step));
                }
                if let Some(run) = self.run.as_mut() {
                    run.current = step;
                }
                Ok(())
            }
        }
    }

    /// Candidate loaders. The HTTP layer calls these after the matching AI
    /// action returns; the state machine itself never talks to the model.
    pub fn set_title_candidates(&mut self, candidates: Vec<String>) -> Result<(), WizardError> {
        let run = self.run.as_mut().ok_or(WizardError::NoActiveRun)?;
        run.title_candidates = candidates;
        run.chosen_title = None;
        Ok(())
    }

    pub fn set_bullet_candidates(&mut self, candidates: Vec<String>) -> Result<(), WizardError> {
        let run = self.run.as_mut().ok_or(WizardError::NoActiveRun)?;
        run.bullet_candidates = candidates;
        run.chosen_bullets.clear();
        run.completed.remove(&OptimizeStep::Bullet);
        Ok(())
    }

    pub fn set_description_candidates(
        &mut self,
        candidates: Vec<String>,
    ) -> Result<(), WizardError> {
        let run = self.run.as_mut().ok_or(WizardError::NoActiveRun)?;
        run.description_candidates = candidates;
        run.chosen_description = None;
        Ok(())
    }

    /// The before/after pair the preview screen sends for analysis. Only
    /// valid once all three editing steps are complete.
    pub fn preview_payload(&self) -> Result<(ListingContent, ListingContent), WizardError> {
        let run = self.run.as_ref().ok_or(WizardError::NoActiveRun)?;
        let done = [
            OptimizeStep::Title,
            OptimizeStep::Bullet,
            OptimizeStep::Description,
        ]
        .iter()
        .all(|step| run.completed.contains(step));
        if !done {
            return Err(WizardError::PreviewIncomplete);
        }

        let title = run
            .chosen_title
            .and_then(|index| run.title_candidates.get(index))
            .cloned()
            .unwrap_or_else(|| run.original.title.clone());
        let bullet_points = run
            .chosen_bullets
            .iter()
            .filter_map(|&index| run.bullet_candidates.get(index))
            .cloned()
            .collect();
        let description = run
            .chosen_description
            .and_then(|index| run.description_candidates.get(index))
            .cloned()
            .unwrap_or_else(|| run.original.description.clone());

        Ok((
            run.original.clone(),
            ListingContent {
                title,
                bullet_points,
                description,
            },
        ))
    }

    /// Analysis results stick to the run; a new run drops them.
    pub fn cache_analysis(&mut self, metrics: ListingMetrics) -> Result<(), WizardError> {
        let run = self.run.as_mut().ok_or(WizardError::NoActiveRun)?;
        run.cached_analysis = Some(metrics);
        Ok(())
    }

    pub fn cached_analysis(&self) -> Option<&ListingMetrics> {
        self.run.as_ref().and_then(|run| run.cached_analysis.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn original() -> ListingContent {
        ListingContent {
            title: "Original Matcha Title".into(),
            bullet_points: vec!["old bullet".into()],
            description: "old description".into(),
        }
    }

    fn started() -> WizardState {
        let mut state = WizardState::new();
        state
            .transition(WizardEvent::StartRun {
                asin: "B07DJ1KVDP".into(),
                hero_keyword: "matcha powder".into(),
                original: original(),
                title_seed: Some("Original Matcha Title".into()),
            })
            .expect("start");
        state
    }

    fn complete_all(state: &mut WizardState) {
        state
            .set_title_candidates(vec!["T1".into(), "T2".into()])
            .unwrap();
        state
            .set_bullet_candidates((1..=10).map(|i| format!("B{i}")).collect())
            .unwrap();
        state
            .set_description_candidates(vec!["D1".into()])
            .unwrap();
        state.transition(WizardEvent::SelectTitle(1)).unwrap();
        state
            .transition(WizardEvent::SetBulletSelection(vec![0, 2, 4, 6, 8]))
            .unwrap();
        state.transition(WizardEvent::SelectDescription(0)).unwrap();
    }

    #[test]
    fn events_without_a_run_are_rejected() {
        let mut state = WizardState::new();
        assert_eq!(
            state.transition(WizardEvent::SelectTitle(0)),
            Err(WizardError::NoActiveRun)
        );
        assert!(!state.step_available(OptimizeStep::Title));
    }

    #[test]
    fn only_the_first_step_is_open_initially() {
        let state = started();
        assert!(state.step_available(OptimizeStep::Title));
        assert!(!state.step_available(OptimizeStep::Bullet));
        assert!(!state.step_available(OptimizeStep::Description));
        assert!(!state.step_available(OptimizeStep::Preview));
    }

    #[test]
    fn later_steps_unlock_as_earlier_ones_complete() {
        let mut state = started();
        state.set_title_candidates(vec!["T1".into()]).unwrap();
        state.transition(WizardEvent::SelectTitle(0)).unwrap();
        assert!(state.step_available(OptimizeStep::Bullet));
        assert!(!state.step_available(OptimizeStep::Description));

        state
            .set_bullet_candidates((1..=6).map(|i| format!("B{i}")).collect())
            .unwrap();
        state
            .transition(WizardEvent::SetBulletSelection(vec![0, 1, 2, 3, 4]))
            .unwrap();
        assert!(state.step_available(OptimizeStep::Description));
        assert!(!state.step_available(OptimizeStep::Preview));
    }

    #[test]
    fn completed_steps_stay_reachable() {
        let mut state = started();
        complete_all(&mut state);
        state.transition(WizardEvent::GoTo(OptimizeStep::Preview)).unwrap();
        state.transition(WizardEvent::GoTo(OptimizeStep::Title)).unwrap();
        assert_eq!(state.current_step(), Some(OptimizeStep::Title));
    }

    #[test]
    fn locked_navigation_is_a_typed_rejection() {
        let mut state = started();
        assert_eq!(
            state.transition(WizardEvent::GoTo(OptimizeStep::Description)),
            Err(WizardError::StepLocked(OptimizeStep::Description))
        );
    }

    #[test]
    fn bullets_complete_only_at_exactly_five() {
        let mut state = started();
        state.set_title_candidates(vec!["T1".into()]).unwrap();
        state.transition(WizardEvent::SelectTitle(0)).unwrap();
        state
            .set_bullet_candidates((1..=10).map(|i| format!("B{i}")).collect())
            .unwrap();

        state
            .transition(WizardEvent::SetBulletSelection(vec![0, 1, 2, 3]))
            .unwrap();
        assert!(!state.is_completed(OptimizeStep::Bullet));

        state
            .transition(WizardEvent::SetBulletSelection(vec![0, 1, 2, 3, 4]))
            .unwrap();
        assert!(state.is_completed(OptimizeStep::Bullet));

        // Dropping back below five revokes the completion.
        state
            .transition(WizardEvent::SetBulletSelection(vec![0, 1]))
            .unwrap();
        assert!(!state.is_completed(OptimizeStep::Bullet));
        assert!(!state.step_available(OptimizeStep::Description));
    }

    #[test]
    fn candidate_indices_are_bounds_checked() {
        let mut state = started();
        state.set_title_candidates(vec!["T1".into()]).unwrap();
        assert_eq!(
            state.transition(WizardEvent::SelectTitle(5)),
            Err(WizardError::CandidateOutOfRange {
                step: OptimizeStep::Title,
                index: 5,
                len: 1
            })
        );
    }

    #[test]
    fn preview_payload_pairs_snapshot_with_choices() {
        let mut state = started();
        complete_all(&mut state);
        let (before, after) = state.preview_payload().expect("complete run");
        assert_eq!(before, original());
        assert_eq!(after.title, "T2");
        assert_eq!(after.bullet_points, vec!["B1", "B3", "B5", "B7", "B9"]);
        assert_eq!(after.description, "D1");
    }

    #[test]
    fn preview_before_completion_is_rejected() {
        let state = started();
        assert_eq!(
            state.preview_payload().unwrap_err(),
            WizardError::PreviewIncomplete
        );
    }

    #[test]
    fn new_run_resets_progress_and_cached_analysis() {
        let mut state = started();
        complete_all(&mut state);
        state
            .cache_analysis(ListingMetrics::fallback())
            .expect("cache");
        assert!(state.cached_analysis().is_some());
        let first_id = state.run().unwrap().id;

        state
            .transition(WizardEvent::StartRun {
                asin: "B01HQPPWHG".into(),
                hero_keyword: "green tea".into(),
                original: original(),
                title_seed: None,
            })
            .expect("restart");
        assert_ne!(state.run().unwrap().id, first_id);
        assert!(state.cached_analysis().is_none());
        assert!(!state.is_completed(OptimizeStep::Title));
        assert!(!state.step_available(OptimizeStep::Bullet));
        assert!(state.run().unwrap().title_candidates.is_empty());
    }

    #[test]
    fn title_seed_becomes_the_first_candidate() {
        let state = started();
        assert_eq!(
            state.run().unwrap().title_candidates,
            vec!["Original Matcha Title".to_string()]
        );
    }
}
