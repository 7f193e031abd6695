//! Plan generation: intent classification and table-driven step templates.
//!
//! Planning never raises. When the goal defeats classification the
//! generator falls back to a fixed generic plan, so every mission always
//! receives at least four steps ending in a QA step, with gap-free
//! sequential ids.

use serde::Serialize;
use tracing::debug;

use crate::models::step::{DelegateTier, Stage, Step, StepStatus};

/// Heuristically classified mission intent.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Regulatory strategy or submission work.
    Regulatory,
    /// Health technology assessment.
    Hta,
    /// Market access and pricing.
    MarketAccess,
    /// Commercial launch or brand work.
    Commercial,
    /// Clinical development.
    Clinical,
    /// Safety and pharmacovigilance.
    Safety,
    /// Nothing matched.
    General,
}

/// Keyword table driving classification. First matching row wins.
const INTENT_KEYWORDS: &[(Intent, &[&str])] = &[
    (
        Intent::Regulatory,
        &["regulatory", "fda", "ema", "submission", "label", "approval pathway"],
    ),
    (Intent::Hta, &["hta", "health technology assessment"]),
    (
        Intent::MarketAccess,
        &["market access", "pricing", "reimburs", "payer", "formulary"],
    ),
    (Intent::Commercial, &["commercial", "launch", "brand", "go-to-market"]),
    (
        Intent::Clinical,
        &["clinical", "trial", "efficacy", "endpoint", "protocol"],
    ),
    (
        Intent::Safety,
        &["safety", "adverse", "pharmacovigilance", "signal detection"],
    ),
];

/// Intents that receive the "Access & Pricing" enrichment step.
const ACCESS_INTENTS: &[Intent] = &[
    Intent::Regulatory,
    Intent::Hta,
    Intent::MarketAccess,
    Intent::Commercial,
];

/// Intents that receive the "Clinical Evidence Appraisal" enrichment step.
const CLINICAL_INTENTS: &[Intent] = &[Intent::Clinical, Intent::Safety];

/// Classify a goal into an intent by keyword lookup.
#[must_use]
pub fn classify_intent(goal: &str) -> Intent {
    let lowered = goal.to_lowercase();
    for (intent, keywords) in INTENT_KEYWORDS {
        if keywords.iter().any(|kw| lowered.contains(kw)) {
            return *intent;
        }
    }
    Intent::General
}

/// Recommended tool affinities for an intent, used to pick workers.
#[must_use]
pub fn tool_affinities(intent: Intent) -> &'static [&'static str] {
    match intent {
        Intent::Regulatory | Intent::Hta => &["registry_search", "guideline_lookup"],
        Intent::MarketAccess | Intent::Commercial => &["pricing_db", "payer_landscape"],
        Intent::Clinical | Intent::Safety => &["literature_lookup", "trial_registry"],
        Intent::General => &["registry_search"],
    }
}

struct StepTemplate {
    name: &'static str,
    description: &'static str,
    stage: Stage,
    tier: DelegateTier,
    worker: &'static str,
}

const BASE_PLAN: &[StepTemplate] = &[
    StepTemplate {
        name: "Mission Framing",
        description: "Establish scope, constraints, and success criteria for the goal",
        stage: Stage::Strategy,
        tier: DelegateTier::L2,
        worker: "navigator",
    },
    StepTemplate {
        name: "Evidence Retrieval",
        description: "Gather supporting evidence and citations from available sources",
        stage: Stage::Evidence,
        tier: DelegateTier::L3,
        worker: "researcher",
    },
    StepTemplate {
        name: "Domain Analysis",
        description: "Analyze the gathered evidence against the mission goal",
        stage: Stage::Analysis,
        tier: DelegateTier::L3,
        worker: "analyst",
    },
    StepTemplate {
        name: "Synthesis",
        description: "Compose the combined findings into a coherent deliverable",
        stage: Stage::Synthesis,
        tier: DelegateTier::L2,
        worker: "synthesizer",
    },
    StepTemplate {
        name: "Quality Review",
        description: "Check the deliverable for consistency, gaps, and unsupported claims",
        stage: Stage::Qa,
        tier: DelegateTier::L2,
        worker: "reviewer",
    },
];

const GENERIC_PLAN: &[StepTemplate] = &[
    StepTemplate {
        name: "Mission Framing",
        description: "Establish scope and success criteria for the goal",
        stage: Stage::Strategy,
        tier: DelegateTier::L2,
        worker: "navigator",
    },
    StepTemplate {
        name: "Evidence Retrieval",
        description: "Gather supporting evidence from available sources",
        stage: Stage::Evidence,
        tier: DelegateTier::L3,
        worker: "researcher",
    },
    StepTemplate {
        name: "Synthesis",
        description: "Compose the findings into a coherent deliverable",
        stage: Stage::Synthesis,
        tier: DelegateTier::L2,
        worker: "synthesizer",
    },
    StepTemplate {
        name: "Quality Review",
        description: "Check the deliverable for consistency and gaps",
        stage: Stage::Qa,
        tier: DelegateTier::L2,
        worker: "reviewer",
    },
];

const ACCESS_ENRICHMENT: StepTemplate = StepTemplate {
    name: "Access & Pricing",
    description: "Assess access, pricing, and reimbursement implications",
    stage: Stage::Analysis,
    tier: DelegateTier::L3,
    worker: "access-strategist",
};

const CLINICAL_ENRICHMENT: StepTemplate = StepTemplate {
    name: "Clinical Evidence Appraisal",
    description: "Appraise clinical evidence strength and relevance",
    stage: Stage::Analysis,
    tier: DelegateTier::L3,
    worker: "clinical-appraiser",
};

fn instantiate(templates: &[&StepTemplate]) -> Vec<Step> {
    let mut steps: Vec<Step> = templates
        .iter()
        .map(|tpl| Step {
            id: String::new(),
            name: tpl.name.to_owned(),
            description: tpl.description.to_owned(),
            tier: tpl.tier,
            worker: tpl.worker.to_owned(),
            stage: tpl.stage,
            dependencies: Vec::new(),
            status: StepStatus::Pending,
        })
        .collect();
    renumber(&mut steps);
    steps
}

/// Assign gap-free sequential ids and rebuild the linear dependency
/// chain: each step depends on its predecessor.
pub fn renumber(steps: &mut [Step]) {
    for (index, step) in steps.iter_mut().enumerate() {
        step.id = format!("step_{}", index + 1);
        step.dependencies = if index == 0 {
            Vec::new()
        } else {
            vec![format!("step_{index}")]
        };
    }
}

/// Build the execution plan for a goal.
///
/// This path must never raise: classification falls back to
/// [`Intent::General`], and an empty goal still yields the generic plan.
#[must_use]
pub fn build_plan(goal: &str) -> Vec<Step> {
    if goal.trim().is_empty() {
        debug!("empty goal; using generic fallback plan");
        return generic_plan();
    }

    let intent = classify_intent(goal);
    build_plan_for_intent(intent)
}

/// Fixed generic plan used when classification cannot help.
#[must_use]
pub fn generic_plan() -> Vec<Step> {
    instantiate(&GENERIC_PLAN.iter().collect::<Vec<_>>())
}

/// Build a plan for an already-classified intent.
#[must_use]
pub fn build_plan_for_intent(intent: Intent) -> Vec<Step> {
    let mut templates: Vec<&StepTemplate> = BASE_PLAN.iter().collect();

    // Table-driven enrichment: insert the domain analysis step directly
    // after evidence retrieval.
    let enrichment = if ACCESS_INTENTS.contains(&intent) {
        Some(&ACCESS_ENRICHMENT)
    } else if CLINICAL_INTENTS.contains(&intent) {
        Some(&CLINICAL_ENRICHMENT)
    } else {
        None
    };

    if let Some(extra) = enrichment {
        let after_evidence = templates
            .iter()
            .position(|tpl| tpl.stage == Stage::Evidence)
            .map_or(templates.len(), |pos| pos + 1);
        templates.insert(after_evidence, extra);
    }

    instantiate(&templates)
}
