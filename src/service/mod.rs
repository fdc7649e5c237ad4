pub mod browser;
pub mod classifier;
pub mod completion;
pub mod crawler;
pub mod http;
pub mod narrative;
pub mod orchestrator;
pub mod platform;
pub mod scanner;
pub mod scoring;

pub use browser::{BrowserProvider, ChromeProvider};
pub use classifier::IssueClassifier;
pub use crawler::CrawlerService;
pub use narrative::NarrativeEnhancer;
pub use orchestrator::{AuditOrchestrator, AuditStage, StageTracker};
pub use platform::PlatformDetector;
pub use scoring::ScoreCalculator;
