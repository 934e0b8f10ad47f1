//! Application-level configuration loading, including the runtime question bank.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use rand::{Rng, seq::IndexedRandom};
use serde::Deserialize;
use tracing::{info, warn};

use crate::state::{
    outbox::DEFAULT_OUTBOX_CAPACITY,
    session::{QUESTIONS_PER_SESSION, Question},
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "VINO_TRIVIA_CONFIG_PATH";
/// Sessions idle longer than this are swept by default.
const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
/// How often the retention sweep runs by default.
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 10 * 60;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    questions: Vec<Question>,
    /// Sessions idle longer than this are deleted by the retention sweep.
    pub session_ttl: Duration,
    /// Interval between retention sweeps.
    pub sweep_interval: Duration,
    /// Maximum number of intents the offline queue will hold.
    pub outbox_capacity: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// baked-in question bank when the file is absent or invalid.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    match validate_bank(&config.questions) {
                        Ok(()) => {
                            info!(
                                path = %path.display(),
                                count = config.questions.len(),
                                "loaded question bank from config"
                            );
                            config
                        }
                        Err(reason) => {
                            warn!(
                                path = %path.display(),
                                reason,
                                "configured question bank is unusable; falling back to defaults"
                            );
                            Self {
                                questions: default_question_bank(),
                                ..config
                            }
                        }
                    }
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Draw a fresh question set without replacement from the bank.
    pub fn sample_questions(&self, rng: &mut impl Rng) -> Vec<Question> {
        self.questions
            .choose_multiple(rng, QUESTIONS_PER_SESSION)
            .cloned()
            .collect()
    }

    /// Full question bank, mostly for inspection in tests.
    pub fn question_bank(&self) -> &[Question] {
        &self.questions
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            questions: default_question_bank(),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    questions: Vec<RawQuestion>,
    #[serde(default)]
    session_ttl_secs: Option<u64>,
    #[serde(default)]
    sweep_interval_secs: Option<u64>,
    #[serde(default)]
    outbox_capacity: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        let questions = if value.questions.is_empty() {
            default_question_bank()
        } else {
            value.questions.into_iter().map(Into::into).collect()
        };

        Self {
            questions,
            session_ttl: value
                .session_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_ttl),
            sweep_interval: value
                .sweep_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            outbox_capacity: value.outbox_capacity.unwrap_or(defaults.outbox_capacity),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of a single question inside the configuration file.
struct RawQuestion {
    question: String,
    options: Vec<String>,
    correct_answer: String,
    explanation: String,
}

impl From<RawQuestion> for Question {
    fn from(value: RawQuestion) -> Self {
        Self {
            question: value.question,
            options: value.options,
            correct_answer: value.correct_answer,
            explanation: value.explanation,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Check that a bank can seed sessions: enough questions, four distinct
/// options each, and a correct answer that is one of them.
fn validate_bank(questions: &[Question]) -> Result<(), &'static str> {
    if questions.len() < QUESTIONS_PER_SESSION {
        return Err("bank holds fewer questions than a session needs");
    }
    for question in questions {
        if question.options.len() != 4 {
            return Err("every question needs exactly four options");
        }
        let mut options = question.options.clone();
        options.sort();
        options.dedup();
        if options.len() != 4 {
            return Err("question options must be distinct");
        }
        if !question.options.contains(&question.correct_answer) {
            return Err("correct answer must be one of the options");
        }
    }
    Ok(())
}

macro_rules! bank_question {
    ($prompt:expr, [$a:expr, $b:expr, $c:expr, $d:expr], $correct:expr, $why:expr) => {
        Question {
            question: $prompt.into(),
            options: vec![$a.into(), $b.into(), $c.into(), $d.into()],
            correct_answer: $correct.into(),
            explanation: $why.into(),
        }
    };
}

/// Built-in wine question bank shipped with the binary.
fn default_question_bank() -> Vec<Question> {
    vec![
        bank_question!(
            "Which grape variety is the backbone of red Burgundy?",
            ["Pinot Noir", "Merlot", "Syrah", "Gamay"],
            "Pinot Noir",
            "Red Burgundy is made almost exclusively from Pinot Noir; Gamay is reserved for Beaujolais."
        ),
        bank_question!(
            "What does 'terroir' refer to?",
            [
                "The complete natural environment of a vineyard",
                "The age of the vines",
                "The barrel toasting level",
                "The blend of grape varieties"
            ],
            "The complete natural environment of a vineyard",
            "Terroir covers soil, climate, aspect, and everything else a site imprints on its wine."
        ),
        bank_question!(
            "Which region is famous for Sauvignon Blanc and Sémillon blends?",
            ["Bordeaux", "Alsace", "Rioja", "Mosel"],
            "Bordeaux",
            "White Bordeaux classically blends Sauvignon Blanc with Sémillon, notably in Graves and Sauternes."
        ),
        bank_question!(
            "Champagne may only be labelled as such when it comes from?",
            [
                "The Champagne region of France",
                "Any French sparkling producer",
                "Anywhere using the traditional method",
                "Vineyards planted with Chardonnay"
            ],
            "The Champagne region of France",
            "The name is a protected appellation tied to the region, not the method."
        ),
        bank_question!(
            "Which of these is a fortified wine?",
            ["Port", "Chianti", "Muscadet", "Barolo"],
            "Port",
            "Port is fortified with grape spirit during fermentation, which preserves its sweetness."
        ),
        bank_question!(
            "Tannins in red wine primarily come from?",
            [
                "Grape skins, seeds, and stems",
                "Added sulfites",
                "Fermentation yeast",
                "Residual sugar"
            ],
            "Grape skins, seeds, and stems",
            "Maceration extracts tannin from the solid parts of the grape; oak can add more later."
        ),
        bank_question!(
            "Which Italian wine is made from Nebbiolo?",
            ["Barolo", "Chianti", "Valpolicella", "Soave"],
            "Barolo",
            "Barolo and Barbaresco are Piedmont's flagship Nebbiolo wines; Chianti is Sangiovese."
        ),
        bank_question!(
            "What is the ideal serving temperature for most full-bodied red wines?",
            ["16-18°C", "4-6°C", "22-25°C", "10-12°C"],
            "16-18°C",
            "Slightly below room temperature keeps alcohol in check while letting aromas open up."
        ),
        bank_question!(
            "Malolactic conversion in winemaking turns?",
            [
                "Malic acid into softer lactic acid",
                "Sugar into alcohol",
                "Tannin into glycerol",
                "Lactic acid into malic acid"
            ],
            "Malic acid into softer lactic acid",
            "The bacterial conversion rounds out sharp malic acid and can add buttery notes."
        ),
        bank_question!(
            "Which country is the original home of the Malbec grape?",
            ["France", "Argentina", "Chile", "Spain"],
            "France",
            "Malbec originates in Cahors in southwest France, though Argentina made it famous."
        ),
        bank_question!(
            "A wine described as 'brut' is?",
            ["Dry", "Sweet", "Lightly sparkling", "Oxidized"],
            "Dry",
            "Brut indicates low residual sugar, drier than extra dry on the sparkling-wine scale."
        ),
        bank_question!(
            "Which white grape dominates Chablis?",
            ["Chardonnay", "Riesling", "Viognier", "Chenin Blanc"],
            "Chardonnay",
            "Chablis is 100% Chardonnay, typically unoaked and marked by its limestone soils."
        ),
        bank_question!(
            "Noble rot, prized in Sauternes, is caused by?",
            [
                "The fungus Botrytis cinerea",
                "Excessive sunshine",
                "Late spring frost",
                "Wild yeast on the skins"
            ],
            "The fungus Botrytis cinerea",
            "Botrytis shrivels the berries and concentrates sugar and flavour for sweet wines."
        ),
        bank_question!(
            "Which of these regions is best known for Riesling?",
            ["Mosel", "Rioja", "Barossa Valley", "Maipo Valley"],
            "Mosel",
            "The Mosel's steep slate slopes produce some of the world's most celebrated Rieslings."
        ),
    ]
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn default_bank_is_valid_and_large_enough() {
        let bank = default_question_bank();
        assert!(bank.len() >= QUESTIONS_PER_SESSION);
        assert!(validate_bank(&bank).is_ok());
    }

    #[test]
    fn sampling_draws_ten_distinct_questions() {
        let config = AppConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        let sampled = config.sample_questions(&mut rng);

        assert_eq!(sampled.len(), QUESTIONS_PER_SESSION);
        let mut prompts: Vec<&str> = sampled.iter().map(|q| q.question.as_str()).collect();
        prompts.sort_unstable();
        prompts.dedup();
        assert_eq!(prompts.len(), QUESTIONS_PER_SESSION);
    }

    #[test]
    fn bank_validation_catches_duplicate_options() {
        let mut bank = default_question_bank();
        bank[0].options[1] = bank[0].options[0].clone();
        assert!(validate_bank(&bank).is_err());
    }
}
