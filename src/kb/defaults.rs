// src/kb/defaults.rs
// Compiled-in knowledge base defaults. These keep the service useful when a
// knowledge base file is missing or malformed; deployments override them
// with the JSON files in TB_KB_DIR.

use super::{
    AdviceCandidate, BucketFile, BucketOverride, ContextRule, IntensityModifier, LexiconEntry,
    PhraseEdgeRule, SignalRule, Tier,
};
use crate::attachment::AttachmentStyle;
use crate::tone::buckets::{Bucket, BucketWeights};
use crate::tone::Tone;
use std::collections::BTreeMap;

fn lex(term: &str, tone: Tone, weight: f32) -> LexiconEntry {
    LexiconEntry {
        term: term.to_string(),
        tone,
        weight,
    }
}

pub(crate) fn emotion_lexicon() -> Vec<LexiconEntry> {
    vec![
        // Angry
        lex("angry", Tone::Angry, 1.0),
        lex("furious", Tone::Angry, 1.3),
        lex("hate", Tone::Angry, 1.2),
        lex("pissed", Tone::Angry, 1.2),
        lex("mad", Tone::Angry, 0.9),
        lex("screaming", Tone::Angry, 1.0),
        lex("fault", Tone::Angry, 0.6),
        lex("ridiculous", Tone::Angry, 0.7),
        lex("selfish", Tone::Angry, 0.8),
        // Frustrated
        lex("frustrated", Tone::Frustrated, 1.2),
        lex("annoying", Tone::Frustrated, 0.9),
        lex("sick of", Tone::Frustrated, 1.1),
        lex("tired of", Tone::Frustrated, 1.0),
        lex("again", Tone::Frustrated, 0.4),
        lex("ugh", Tone::Frustrated, 0.8),
        lex("every time", Tone::Frustrated, 0.7),
        lex("pointless", Tone::Frustrated, 0.8),
        // Anxious
        lex("worried", Tone::Anxious, 1.1),
        lex("scared", Tone::Anxious, 1.1),
        lex("nervous", Tone::Anxious, 1.0),
        lex("afraid", Tone::Anxious, 1.0),
        lex("what if", Tone::Anxious, 0.9),
        lex("panic", Tone::Anxious, 1.2),
        lex("overthinking", Tone::Anxious, 0.9),
        lex("can't stop thinking", Tone::Anxious, 1.0),
        lex("did i do something", Tone::Anxious, 1.0),
        // Sad
        lex("sad", Tone::Sad, 1.1),
        lex("hurt", Tone::Sad, 0.9),
        lex("lonely", Tone::Sad, 1.1),
        lex("crying", Tone::Sad, 1.2),
        lex("miss you", Tone::Sad, 0.8),
        lex("heartbroken", Tone::Sad, 1.3),
        lex("empty", Tone::Sad, 0.8),
        lex("disappointed", Tone::Sad, 0.8),
        // Withdrawn
        lex("whatever", Tone::Withdrawn, 1.2),
        lex("fine", Tone::Withdrawn, 0.8),
        lex("nevermind", Tone::Withdrawn, 1.1),
        lex("never mind", Tone::Withdrawn, 1.1),
        lex("forget it", Tone::Withdrawn, 1.2),
        lex("doesn't matter", Tone::Withdrawn, 1.0),
        lex("don't care", Tone::Withdrawn, 1.0),
        lex("i'm done", Tone::Withdrawn, 1.0),
        lex("leave me alone", Tone::Withdrawn, 1.1),
        // Supportive
        lex("love", Tone::Supportive, 0.9),
        lex("appreciate", Tone::Supportive, 1.1),
        lex("thank", Tone::Supportive, 0.9),
        lex("proud of", Tone::Supportive, 1.1),
        lex("here for you", Tone::Supportive, 1.2),
        lex("i understand", Tone::Supportive, 1.0),
        lex("that makes sense", Tone::Supportive, 0.9),
        lex("grateful", Tone::Supportive, 1.0),
        // Assertive
        lex("i need", Tone::Assertive, 0.9),
        lex("i want", Tone::Assertive, 0.8),
        lex("let's", Tone::Assertive, 0.6),
        lex("we should", Tone::Assertive, 0.7),
        lex("i feel", Tone::Assertive, 0.7),
        lex("boundary", Tone::Assertive, 0.9),
        lex("not okay with", Tone::Assertive, 1.0),
        // Neutral
        lex("okay", Tone::Neutral, 0.5),
        lex("sure", Tone::Neutral, 0.4),
        lex("sounds good", Tone::Neutral, 0.6),
        lex("see you", Tone::Neutral, 0.5),
        lex("on my way", Tone::Neutral, 0.6),
    ]
}

fn ctx(context: &str, keywords: &[&str], weight: f32) -> ContextRule {
    ContextRule {
        context: context.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        weight,
    }
}

pub(crate) fn context_rules() -> Vec<ContextRule> {
    vec![
        ctx(
            "conflict",
            &["fight", "argument", "arguing", "fault", "blame", "yelling", "always", "never"],
            1.0,
        ),
        ctx(
            "repair",
            &["sorry", "apologize", "make it up", "start over", "didn't mean", "forgive"],
            1.0,
        ),
        ctx(
            "planning",
            &["tonight", "tomorrow", "weekend", "dinner", "schedule", "plan", "pick up"],
            0.8,
        ),
        ctx(
            "intimacy",
            &["close", "closer", "miss you", "hold", "connect", "distant lately"],
            0.9,
        ),
        ctx(
            "boundary",
            &["space", "boundary", "boundaries", "too much", "need time", "respect"],
            1.0,
        ),
        ctx(
            "jealousy",
            &["jealous", "who is", "who was", "texting", "liked her", "liked his"],
            1.0,
        ),
        ctx(
            "gratitude",
            &["thank you", "thanks", "appreciate", "grateful", "meant a lot"],
            0.9,
        ),
    ]
}

fn markers(style: AttachmentStyle, patterns: &[&str], weight: f32) -> SignalRule {
    SignalRule {
        style,
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
        weight,
    }
}

/// Lexical attachment markers for per-message feature extraction.
/// Patterns are matched as plain lowercase substrings.
pub(crate) fn attachment_markers() -> Vec<SignalRule> {
    vec![
        markers(
            AttachmentStyle::Anxious,
            &[
                "are you mad at me",
                "please don't leave",
                "why haven't you answered",
                "do you still love me",
                "did i do something wrong",
                "i'm sorry i'm sorry",
            ],
            1.0,
        ),
        markers(
            AttachmentStyle::Avoidant,
            &[
                "i need space",
                "can we not talk about this",
                "it doesn't matter",
                "forget it",
                "i'm fine",
                "whatever",
            ],
            1.0,
        ),
        markers(
            AttachmentStyle::Disorganized,
            &[
                "i love you but",
                "i hate you don't leave",
                "come here",
                "stay away",
                "i don't know what i want",
            ],
            1.0,
        ),
        markers(
            AttachmentStyle::Secure,
            &[
                "let's talk about it",
                "i hear you",
                "that makes sense",
                "we can work through",
                "i understand why",
            ],
            1.0,
        ),
    ]
}

/// Regex signal tables for the multi-day attachment learner. Stronger
/// weights are applied first against the shared daily increment budget.
pub(crate) fn attachment_signals() -> Vec<SignalRule> {
    vec![
        markers(
            AttachmentStyle::Anxious,
            &[
                r"are you (mad|upset|angry) (at|with) me",
                r"please don'?t (leave|go)",
                r"why (haven'?t|didn'?t) you (answered|replied|texted)",
                r"do you still (love|like) me",
                r"i keep checking",
            ],
            2.0,
        ),
        markers(
            AttachmentStyle::Anxious,
            &[r"\bsorry\b.*\bsorry\b", r"what if you", r"\bneed to know\b"],
            1.0,
        ),
        markers(
            AttachmentStyle::Avoidant,
            &[
                r"i need (some )?space",
                r"can we (please )?not talk about",
                r"\bforget it\b",
                r"doesn'?t matter anyway",
            ],
            2.0,
        ),
        markers(
            AttachmentStyle::Avoidant,
            &[r"i'?m fine\b", r"\bwhatever\b", r"don'?t want to talk"],
            1.0,
        ),
        markers(
            AttachmentStyle::Disorganized,
            &[
                r"i (love|hate) you but",
                r"(come (here|back)).*(go away|leave)",
                r"don'?t know what i want",
                r"push(ing)? you away.*want you",
            ],
            2.0,
        ),
        markers(
            AttachmentStyle::Secure,
            &[
                r"let'?s talk (about|through) (it|this)",
                r"i (hear|understand) you",
                r"that makes sense",
                r"we can (work|figure) (through|out)",
                r"thank you for telling me",
            ],
            1.5,
        ),
    ]
}

pub(crate) fn intensity_modifiers() -> Vec<IntensityModifier> {
    let entries: &[(&str, f32)] = &[
        ("really", 1.4),
        ("so", 1.2),
        ("very", 1.3),
        ("extremely", 1.6),
        ("totally", 1.4),
        ("absolutely", 1.5),
        ("completely", 1.5),
        ("literally", 1.3),
        ("always", 1.3),
        ("never", 1.3),
        ("kind of", 0.7),
        ("kinda", 0.7),
        ("a bit", 0.7),
        ("a little", 0.7),
        ("slightly", 0.6),
        ("maybe", 0.8),
        ("sort of", 0.7),
    ];
    entries
        .iter()
        .map(|(term, factor)| IntensityModifier {
            term: term.to_string(),
            factor: *factor,
        })
        .collect()
}

fn edge(label: &str, pattern: &str, weight: f32) -> PhraseEdgeRule {
    PhraseEdgeRule {
        label: label.to_string(),
        pattern: pattern.to_string(),
        weight,
    }
}

pub(crate) fn phrase_edges() -> Vec<PhraseEdgeRule> {
    vec![
        edge("absolutes", r"\byou (always|never)\b", 1.2),
        edge("blame", r"it'?s (all )?your fault", 1.3),
        edge("ultimatum", r"if you (really )?loved me", 1.4),
        edge("shutdown", r"i can'?t do this anymore", 1.5),
        edge("shutdown", r"\bi'?m done\b", 1.2),
        edge("ominous", r"we need to talk", 1.0),
        edge("dismissal", r"\bwhatever you say\b", 1.0),
        edge("mind_reading", r"you (obviously|clearly) don'?t care", 1.2),
    ]
}

pub(crate) fn bucket_file() -> BucketFile {
    let mut base = BTreeMap::new();
    base.insert(Tone::Neutral, BucketWeights::new(0.85, 0.12, 0.03));
    base.insert(Tone::Supportive, BucketWeights::new(0.90, 0.08, 0.02));
    base.insert(Tone::Assertive, BucketWeights::new(0.70, 0.25, 0.05));
    base.insert(Tone::Anxious, BucketWeights::new(0.35, 0.50, 0.15));
    base.insert(Tone::Sad, BucketWeights::new(0.35, 0.50, 0.15));
    base.insert(Tone::Frustrated, BucketWeights::new(0.25, 0.55, 0.20));
    base.insert(Tone::Withdrawn, BucketWeights::new(0.25, 0.55, 0.20));
    base.insert(Tone::Angry, BucketWeights::new(0.10, 0.45, 0.45));

    let overrides = vec![
        // Conflict sharpens everything toward alert
        BucketOverride {
            context: "conflict".to_string(),
            tone: Tone::Angry,
            weights: BucketWeights::new(0.05, 0.35, 0.60),
        },
        BucketOverride {
            context: "conflict".to_string(),
            tone: Tone::Withdrawn,
            weights: BucketWeights::new(0.15, 0.50, 0.35),
        },
        // Repair attempts soften even negative tones
        BucketOverride {
            context: "repair".to_string(),
            tone: Tone::Sad,
            weights: BucketWeights::new(0.55, 0.35, 0.10),
        },
        BucketOverride {
            context: "repair".to_string(),
            tone: Tone::Anxious,
            weights: BucketWeights::new(0.50, 0.40, 0.10),
        },
        // Planning chatter rarely needs caution
        BucketOverride {
            context: "planning".to_string(),
            tone: Tone::Neutral,
            weights: BucketWeights::new(0.95, 0.04, 0.01),
        },
    ];

    BucketFile {
        base,
        overrides,
        low_threshold: 0.3,
        high_threshold: 0.7,
        shift_low: BucketWeights::new(0.08, -0.04, -0.04),
        shift_medium: BucketWeights::new(0.0, 0.0, 0.0),
        shift_high: BucketWeights::new(-0.10, 0.02, 0.08),
    }
}

fn advice(
    id: &str,
    template: &str,
    bucket: Bucket,
    context_tags: &[&str],
    attachment_tags: &[AttachmentStyle],
    severity: BucketWeights,
    category: &str,
    tier: Tier,
) -> AdviceCandidate {
    AdviceCandidate {
        id: id.to_string(),
        template: template.to_string(),
        bucket,
        context_tags: context_tags.iter().map(|t| t.to_string()).collect(),
        attachment_tags: attachment_tags.to_vec(),
        severity,
        category: category.to_string(),
        tier,
    }
}

pub(crate) fn advice_candidates() -> Vec<AdviceCandidate> {
    vec![
        advice(
            "reflect-before-send",
            "Before you send this, take one slow breath and reread it as if you were receiving it.",
            Bucket::Caution,
            &["conflict"],
            &[],
            BucketWeights::new(0.3, 0.55, 0.75),
            "pause",
            Tier::General,
        ),
        advice(
            "name-the-feeling",
            "Try naming the feeling directly: \"I'm feeling {feeling} right now\" lands softer than implying it.",
            Bucket::Caution,
            &["conflict", "repair"],
            &[AttachmentStyle::Anxious, AttachmentStyle::Disorganized],
            BucketWeights::new(0.35, 0.55, 0.70),
            "expression",
            Tier::General,
        ),
        advice(
            "swap-always-never",
            "Words like \"always\" and \"never\" invite defensiveness. Try describing this one specific moment instead.",
            Bucket::Alert,
            &["conflict"],
            &[],
            BucketWeights::new(0.40, 0.60, 0.80),
            "reframe",
            Tier::General,
        ),
        advice(
            "ask-not-accuse",
            "Turning the accusation into a question (\"Can you help me understand...?\") keeps the door open.",
            Bucket::Alert,
            &["conflict", "jealousy"],
            &[],
            BucketWeights::new(0.45, 0.65, 0.85),
            "reframe",
            Tier::Premium,
        ),
        advice(
            "own-your-side",
            "Leading with your own part (\"I got defensive earlier\") makes repair much more likely to land.",
            Bucket::Caution,
            &["repair"],
            &[AttachmentStyle::Secure],
            BucketWeights::new(0.30, 0.50, 0.70),
            "repair",
            Tier::General,
        ),
        advice(
            "state-the-need",
            "Withdrawing protects you but hides the need. One sentence about what you need gives them a way in.",
            Bucket::Caution,
            &["boundary", "conflict"],
            &[AttachmentStyle::Avoidant],
            BucketWeights::new(0.35, 0.55, 0.75),
            "expression",
            Tier::General,
        ),
        advice(
            "reassure-then-ask",
            "If you're spiraling, say so plainly and ask for what would help: \"I'm anxious — a quick reply would mean a lot.\"",
            Bucket::Caution,
            &["intimacy"],
            &[AttachmentStyle::Anxious],
            BucketWeights::new(0.30, 0.50, 0.70),
            "expression",
            Tier::Premium,
        ),
        advice(
            "time-out-with-return",
            "It's okay to pause a hard conversation — just name when you'll come back: \"I need an hour, then let's finish this.\"",
            Bucket::Alert,
            &["conflict", "boundary"],
            &[AttachmentStyle::Avoidant, AttachmentStyle::Disorganized],
            BucketWeights::new(0.45, 0.65, 0.85),
            "pause",
            Tier::Premium,
        ),
        advice(
            "appreciate-specifics",
            "Gratitude lands hardest when it's specific. Name the exact thing they did and how it helped.",
            Bucket::Clear,
            &["gratitude", "intimacy"],
            &[],
            BucketWeights::new(0.15, 0.35, 0.55),
            "connection",
            Tier::General,
        ),
        advice(
            "keep-it-light",
            "This reads warm and clear — sending it as-is is a fine choice.",
            Bucket::Clear,
            &[],
            &[],
            BucketWeights::new(0.10, 0.30, 0.50),
            "affirmation",
            Tier::General,
        ),
        advice(
            "logistics-confirm",
            "For plans, a concrete confirmation (\"7pm works, see you there\") closes the loop and avoids re-asking.",
            Bucket::Clear,
            &["planning"],
            &[],
            BucketWeights::new(0.10, 0.30, 0.50),
            "clarity",
            Tier::General,
        ),
        advice(
            "soften-the-opener",
            "Harsh openers decide the whole conversation. A softer first sentence makes the rest easier to hear.",
            Bucket::Alert,
            &["conflict"],
            &[],
            BucketWeights::new(0.40, 0.60, 0.85),
            "reframe",
            Tier::General,
        ),
    ]
}

/// Generic reflective prompt used when ranking produces nothing.
pub const FALLBACK_SUGGESTION: &str =
    "Take a moment to reread your message — does it say what you actually feel and need?";
