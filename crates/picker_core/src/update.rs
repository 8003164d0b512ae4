use crate::{AppState, Effect, Msg, Rejection, ScanOrigin, SelectionMode};

/// Pure update function: applies a message to state and returns any effects.
///
/// Every message that mutates state ends with a `BroadcastState` effect so the
/// UI sees the change; rejected commands leave state untouched.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::StartSelection => {
            if state.mode() == SelectionMode::Selecting {
                return (state, Vec::new());
            }
            state.set_mode(SelectionMode::Selecting);
            vec![
                Effect::ScanPage {
                    origin: ScanOrigin::Initial,
                },
                Effect::StartContinuousDetection,
                Effect::BroadcastState(state.snapshot()),
            ]
        }
        Msg::StopSelection => {
            if state.mode() == SelectionMode::Idle {
                return (state, Vec::new());
            }
            state.set_mode(SelectionMode::Idle);
            vec![
                Effect::StopContinuousDetection,
                Effect::BroadcastState(state.snapshot()),
            ]
        }
        Msg::ToggleItem { id } => match state.toggle(&id) {
            Some(_) => vec![Effect::BroadcastState(state.snapshot())],
            None => vec![Effect::CommandRejected(Rejection::UnknownMediaId(id))],
        },
        Msg::ClearSelection => {
            state.clear_selection();
            vec![Effect::BroadcastState(state.snapshot())]
        }
        Msg::RemoveItem { id } => {
            if state.remove_selected(&id) {
                vec![Effect::BroadcastState(state.snapshot())]
            } else {
                vec![Effect::CommandRejected(Rejection::NotSelected(id))]
            }
        }
        Msg::Rescan => vec![Effect::ScanPage {
            origin: ScanOrigin::Rescan,
        }],
        Msg::ScanCompleted {
            origin,
            candidates,
            observed_at_ms,
        } => match origin {
            ScanOrigin::Rescan => {
                state.replace_candidates(candidates, observed_at_ms);
                vec![Effect::BroadcastState(state.snapshot())]
            }
            ScanOrigin::Initial => {
                state.merge_candidates(candidates, observed_at_ms);
                vec![Effect::BroadcastState(state.snapshot())]
            }
            ScanOrigin::Observer | ScanOrigin::FallbackPoll => {
                // Late results from a stopped watcher are dropped.
                if state.mode() != SelectionMode::Selecting {
                    return (state, Vec::new());
                }
                if state.merge_candidates(candidates, observed_at_ms) > 0 {
                    vec![Effect::BroadcastState(state.snapshot())]
                } else {
                    Vec::new()
                }
            }
        },
        Msg::ActiveSlideChanged {
            candidate,
            observed_at_ms,
        } => {
            if state.mode() != SelectionMode::Selecting {
                return (state, Vec::new());
            }
            if state.observe_active_slide(candidate, observed_at_ms) {
                vec![Effect::BroadcastState(state.snapshot())]
            } else {
                Vec::new()
            }
        }
    };

    (state, effects)
}
