use crate::dashboard::state::RunState;

use super::Paint;

pub(super) fn footer_row(state: RunState, pending: usize, cols: usize, paint: &Paint) -> String {
    let (prompt, detail) = match state {
        RunState::Idle | RunState::Running => (
            "press q to stop",
            (pending > 0).then(|| format!("{pending} waiting to start")),
        ),
        RunState::Cancelling { all_stopped: false } => (
            "press q to exit once all have stopped",
            Some("stopping processes".to_owned()),
        ),
        RunState::Cancelling { all_stopped: true } | RunState::Confirmed => {
            ("press q to exit", Some("all processes stopped".to_owned()))
        }
    };
    let plain_len = prompt.chars().count()
        + detail
            .as_ref()
            .map(|text| text.chars().count() + 3)
            .unwrap_or(0);
    if plain_len > cols {
        return prompt.chars().take(cols).collect();
    }
    let theme = paint.theme();
    let prompt = paint.apply(theme.accent, prompt);
    match (state, detail) {
        (RunState::Idle | RunState::Running, Some(detail)) => format!(
            "{prompt}{}{}",
            paint.apply(theme.muted, " · "),
            paint.apply(theme.muted, &detail)
        ),
        (_, Some(detail)) => format!(
            "{}{}{prompt}",
            paint.apply(theme.warning, &detail),
            paint.apply(theme.muted, " · ")
        ),
        (_, None) => prompt,
    }
}
