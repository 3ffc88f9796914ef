pub mod aggregate;
pub mod answers;
pub mod narrative;
pub mod report;

pub use aggregate::{aggregate, DimensionResult, MaturityLevel, ScoreSummary};
pub use answers::{normalize, score_answers, AnswerItem, AnswerType};
pub use narrative::{enrich_report, ActionPlan, NarrativeGenerator};
pub use report::{assemble, GlobalReport, Questionnaire, ReportAssembler, Respondent, SubmittedReport};
