//! Creative Solver (C6): deterministic problem classification with a
//! pluggable generation backend for open-ended output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionType {
    Decomposition,
    Workaround,
    CodeGeneration,
    MultiStep,
    Hybrid,
}

#[derive(Debug, Clone, Default)]
pub struct SolverContext {
    pub attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub description: String,
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub solution_type: SolutionType,
    pub confidence: f64,
    pub sub_tasks: Option<Vec<String>>,
    pub workarounds: Option<Vec<String>>,
    pub code: Option<String>,
    pub plan: Option<Plan>,
}

/// Host-injected collaborator for open-ended code/text generation. Keeps
/// the solver itself free of network I/O and fully unit-testable.
#[async_trait]
pub trait SolutionBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, String>;
}

/// Classify problem type by keyword match. Context override: three or
/// more prior attempts forces `workaround` regardless of keywords.
pub fn analyze_type(problem: &str, context: &SolverContext) -> SolutionType {
    if context.attempts >= 3 {
        return SolutionType::Workaround;
    }
    let lower = problem.to_lowercase();
    if ["code", "generate", "script", "implement", "function"]
        .iter()
        .any(|k| lower.contains(k))
    {
        SolutionType::CodeGeneration
    } else if ["complex", "break down", "decompose", "multi-step task"]
        .iter()
        .any(|k| lower.contains(k))
    {
        SolutionType::Decomposition
    } else if ["blocked", "forbidden", "cannot access", "workaround", "different way"]
        .iter()
        .any(|k| lower.contains(k))
    {
        SolutionType::Workaround
    } else if ["plan", "orchestrate", "sequence", "multi-step"]
        .iter()
        .any(|k| lower.contains(k))
    {
        SolutionType::MultiStep
    } else {
        SolutionType::Hybrid
    }
}

pub struct CreativeSolver {
    backend: Option<Box<dyn SolutionBackend>>,
}

impl CreativeSolver {
    pub fn new(backend: Option<Box<dyn SolutionBackend>>) -> Self {
        Self { backend }
    }

    pub async fn solve(
        &self,
        problem: &str,
        context: Option<&SolverContext>,
        preferred_type: Option<SolutionType>,
    ) -> Solution {
        let context = context.cloned().unwrap_or_default();
        let solution_type = preferred_type.unwrap_or_else(|| analyze_type(problem, &context));
        match solution_type {
            SolutionType::Decomposition => self.decompose(problem),
            SolutionType::Workaround => self.workaround(problem),
            SolutionType::CodeGeneration => self.generate_code(problem).await,
            SolutionType::MultiStep => self.plan(problem),
            SolutionType::Hybrid => self.hybrid(problem, &context).await,
        }
    }

    fn decompose(&self, problem: &str) -> Solution {
        let sub_tasks: Vec<String> = problem
            .split([',', ';'])
            .flat_map(|clause| clause.split(" and "))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let confidence = if sub_tasks.len() > 1 { 0.8 } else { 0.4 };
        Solution {
            solution_type: SolutionType::Decomposition,
            confidence,
            sub_tasks: Some(sub_tasks),
            workarounds: None,
            code: None,
            plan: None,
        }
    }

    fn workaround(&self, problem: &str) -> Solution {
        let workarounds = vec![
            format!("retry '{problem}' through an alternative transport"),
            "fall back to a cached or degraded response".to_string(),
            "request elevated access or a scoped exception".to_string(),
        ];
        Solution {
            solution_type: SolutionType::Workaround,
            confidence: 0.6,
            sub_tasks: None,
            workarounds: Some(workarounds),
            code: None,
            plan: None,
        }
    }

    async fn generate_code(&self, problem: &str) -> Solution {
        let code = match &self.backend {
            Some(backend) => backend
                .generate(&format!("Write code to solve: {problem}"))
                .await
                .unwrap_or_else(|_| skeleton_for(problem)),
            None => skeleton_for(problem),
        };
        Solution {
            solution_type: SolutionType::CodeGeneration,
            confidence: 0.5,
            sub_tasks: None,
            workarounds: None,
            code: Some(code),
            plan: None,
        }
    }

    fn plan(&self, problem: &str) -> Solution {
        let steps = vec![
            PlanStep {
                id: "step-1".into(),
                description: format!("Assess scope of: {problem}"),
                depends_on: vec![],
            },
            PlanStep {
                id: "step-2".into(),
                description: "Execute core work".into(),
                depends_on: vec!["step-1".into()],
            },
            PlanStep {
                id: "step-3".into(),
                description: "Verify outcome".into(),
                depends_on: vec!["step-2".into()],
            },
        ];
        Solution {
            solution_type: SolutionType::MultiStep,
            confidence: 0.6,
            sub_tasks: None,
            workarounds: None,
            code: None,
            plan: Some(Plan { steps }),
        }
    }

    async fn hybrid(&self, problem: &str, context: &SolverContext) -> Solution {
        let decomposition = self.decompose(problem);
        let plan = self.plan(problem);
        let _ = context;
        Solution {
            solution_type: SolutionType::Hybrid,
            confidence: (decomposition.confidence + plan.confidence) / 2.0,
            sub_tasks: decomposition.sub_tasks,
            workarounds: None,
            code: None,
            plan: plan.plan,
        }
    }
}

fn skeleton_for(problem: &str) -> String {
    format!("// TODO: implement solution for: {problem}\nfn solve() {{\n    unimplemented!()\n}}")
}
