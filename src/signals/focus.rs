use std::sync::LazyLock;

use crate::models::SignalKind;

use super::rules::RuleTable;

/// Focus-session cues in priority order. Safety-relevant kinds come first.
static FOCUS_RULES: LazyLock<RuleTable<SignalKind>> = LazyLock::new(|| {
    RuleTable::compile(&[
        (
            "pain",
            r"\b(hurts?|hurting|pain|painful|headache|migraine|aching|aches|sore|injur(ed|y)|dizzy|nause(a|ous))\b",
            SignalKind::Pain,
        ),
        (
            "fatigue",
            r"\b(tired|exhausted|sleepy|drained|fatigued|wiped( out)?|no energy|burn(ed|t) out|can[’']?t keep my eyes open)\b",
            SignalKind::Fatigue,
        ),
        (
            "distraction",
            r"\b(can[’']?t|cannot|can not|unable to)\s+(focus|concentrate)\b|\bdistracted\b|\bmind (is |keeps )?wander(ing|s)?\b|\bkeep checking (my )?phone\b",
            SignalKind::Distraction,
        ),
        (
            "frustration",
            r"\b(frustrat\w*|annoy\w*|ugh+|so stuck|hate this|this is (stupid|pointless)|give up|giving up)\b",
            SignalKind::Frustration,
        ),
        (
            "confusion",
            r"\b(confus\w*|don[’']?t (understand|get it)|makes no sense|not sure (how|what)|i[’']?m lost)\b",
            SignalKind::Confusion,
        ),
        (
            "pause_request",
            r"\b(pause|need a break|take a break|brb|be right back|hold on)\b",
            SignalKind::PauseRequest,
        ),
    ])
});

/// Classify a message sent during a focus session.
pub fn detect_focus_signal(text: &str) -> Option<SignalKind> {
    FOCUS_RULES.classify(text)
}
