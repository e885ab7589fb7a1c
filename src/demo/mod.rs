//! Built-in demo feed.
//!
//! Replays canned prompts, outputs, and interactions into a [`RecordStore`],
//! one step per scheduler tick, so the dashboard has something to show
//! without a real data source. Streams are interleaved round-robin.
//!
//! After an output is appended, the next step marks it as interacted with
//! probability `interaction_chance`, which leaves the rest to be picked up by
//! the abandonment metric.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::schema::DemoConfig;
use crate::scheduler::{Scheduler, Subscription};
use crate::store::RecordStore;
use crate::store::record::{Millis, RecordKind, TimestampedRecord};

/// One canned record.
#[derive(Debug, Clone, PartialEq)]
pub enum DemoStep {
    Prompt(&'static str),
    Output {
        content: &'static str,
        category: &'static str,
    },
    Interaction {
        prompt: &'static str,
        response: &'static str,
        category: &'static str,
        response_type: &'static str,
        latency_ms: f64,
    },
}

const PROMPTS: &[&str] = &[
    "What is the weather like today?",
    "Can you help me with my homework?",
    "What is the weather like today?",
    "Please explain machine learning concepts",
    "Can you help me with my homework?",
    "What's the weather today?",
    "Tell me about artificial intelligence",
    "Help me with my assignment",
    "What's the current weather?",
    "Explain deep learning algorithms",
    "Explain machine learning",
    "Can you explain machine learning in more detail?",
    "Give me a simple example of machine learning",
    "How does Python work?",
    "Can you explain Python programming better?",
    "Show me Python syntax examples",
    "Give me basic Python code",
    "I need Python for data science",
    "What's the capital of France?",
];

const OUTPUTS: &[(&str, &str)] = &[
    ("The weather is sunny with 75°F temperature", "weather"),
    ("Machine learning is a subset of artificial intelligence", "education"),
    ("The weather is sunny with 75°F temperature", "weather"),
    ("Python is a popular programming language", "programming"),
    ("Machine learning is a subset of artificial intelligence", "education"),
    ("The weather is sunny with 75°F temperature", "weather"),
    ("React is a JavaScript library for building UIs", "programming"),
    ("Machine learning is a subset of artificial intelligence", "education"),
    ("Here's a simple Python function: def hello(): print('Hello')", "programming"),
    ("The capital of France is Paris", "general"),
    ("Next.js is a React framework for production", "programming"),
    ("Photosynthesis converts light energy to chemical energy", "education"),
    ("The stock market is volatile today", "finance"),
];

/// (prompt, response, category, response type, latency ms)
const INTERACTIONS: &[(&str, &str, &str, &str, f64)] = &[
    (
        "What is the weather?",
        "The weather is sunny with 75°F temperature.",
        "weather",
        "general",
        800.0,
    ),
    (
        "Explain machine learning briefly",
        "Machine learning is a subset of artificial intelligence that enables computers to \
         learn and make decisions from data without being explicitly programmed for every task.",
        "education",
        "explanation",
        2_500.0,
    ),
    (
        "List 3 programming languages",
        "1. Python\n2. JavaScript\n3. Java",
        "programming",
        "list",
        1_200.0,
    ),
    (
        "Show me Python code for a simple function",
        "def hello_world():\n    print('Hello, World!')\n\n# This is a simple Python function \
         that prints a greeting message.",
        "programming",
        "code",
        1_800.0,
    ),
    (
        "Summarize the benefits of AI",
        "AI offers numerous benefits including automation of repetitive tasks, improved \
         decision-making through data analysis, enhanced customer service with chatbots, and \
         increased efficiency in various industries.",
        "general",
        "summary",
        1_500.0,
    ),
    ("What is 2+2?", "The answer is 4.", "math", "general", 300.0),
    (
        "Describe the process of photosynthesis in detail",
        "Photosynthesis is a complex biochemical process that occurs in plants, algae, and some \
         bacteria. It involves the conversion of light energy into chemical energy, specifically \
         glucose. The process occurs in two main stages: the light-dependent reactions and the \
         light-independent reactions (Calvin cycle). In the light-dependent reactions, \
         chlorophyll absorbs light energy, which is used to split water molecules, releasing \
         oxygen as a byproduct and generating ATP and NADPH. The light-independent reactions use \
         the ATP and NADPH to convert carbon dioxide from the atmosphere into glucose through a \
         series of enzyme-catalyzed reactions. This process is crucial for life on Earth as it \
         produces oxygen and forms the base of most food chains.",
        "education",
        "explanation",
        3_200.0,
    ),
    (
        "Give me a short answer: What is Python?",
        "Python is a high-level programming language known for its simplicity and readability.",
        "programming",
        "general",
        600.0,
    ),
];

/// The full demo script, streams interleaved round-robin.
pub fn script() -> Vec<DemoStep> {
    let prompts = PROMPTS.iter().map(|&p| DemoStep::Prompt(p));
    let outputs = OUTPUTS.iter().map(|&(content, category)| DemoStep::Output { content, category });
    let interactions = INTERACTIONS.iter().map(
        |&(prompt, response, category, response_type, latency_ms)| DemoStep::Interaction {
            prompt,
            response,
            category,
            response_type,
            latency_ms,
        },
    );

    let mut streams: Vec<Box<dyn Iterator<Item = DemoStep>>> =
        vec![Box::new(prompts), Box::new(outputs), Box::new(interactions)];
    let mut steps = Vec::with_capacity(PROMPTS.len() + OUTPUTS.len() + INTERACTIONS.len());
    loop {
        let before = steps.len();
        for stream in &mut streams {
            if let Some(step) = stream.next() {
                steps.push(step);
            }
        }
        if steps.len() == before {
            break;
        }
    }
    steps
}

impl DemoStep {
    pub fn to_record(&self, now: Millis) -> TimestampedRecord {
        match *self {
            Self::Prompt(text) => TimestampedRecord::new(RecordKind::Prompt, text, now),
            Self::Output { content, category } => {
                TimestampedRecord::new(RecordKind::Output, content, now).with_category(category)
            }
            Self::Interaction {
                prompt,
                response,
                category,
                response_type,
                latency_ms,
            } => TimestampedRecord::new(RecordKind::Interaction, prompt, now)
                .with_category(category)
                .with_response(response)
                .with_response_type(response_type)
                .with_latency(latency_ms),
        }
    }
}

/// Stateful cursor over [`script`].
pub struct DemoFeed {
    steps: Vec<DemoStep>,
    cursor: usize,
    interaction_chance: f64,
    /// Output appended on the previous step that the "user" will touch.
    pending_interaction: Option<u64>,
    rng: StdRng,
}

impl DemoFeed {
    pub fn new(interaction_chance: f64) -> Self {
        Self::with_rng(interaction_chance, StdRng::from_entropy())
    }

    pub fn with_rng(interaction_chance: f64, rng: StdRng) -> Self {
        Self {
            steps: script(),
            cursor: 0,
            interaction_chance: interaction_chance.clamp(0.0, 1.0),
            pending_interaction: None,
            rng,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.steps.len() && self.pending_interaction.is_none()
    }

    pub fn remaining(&self) -> usize {
        self.steps.len() - self.cursor
    }

    /// Apply one step to `store`. Returns `false` once the script is exhausted.
    pub fn step(&mut self, store: &mut RecordStore, now: Millis) -> bool {
        if let Some(id) = self.pending_interaction.take() {
            // The output may already have left the window.
            if store.mark_interacted(id).is_ok() {
                tracing::debug!(id, "demo: output interacted");
            }
        }

        let Some(step) = self.steps.get(self.cursor) else {
            return false;
        };
        self.cursor += 1;

        let record = step.to_record(now);
        let kind = record.kind;
        let id = store.insert(record, now);
        tracing::debug!(id, %kind, "demo: record appended");

        if kind == RecordKind::Output && self.rng.gen_bool(self.interaction_chance) {
            self.pending_interaction = Some(id);
        }
        true
    }

    /// Drive this feed from `scheduler`, appending to the shared store every
    /// `config.interval_ms`. The feed unregisters itself once the script is
    /// exhausted, or earlier if the subscription drops.
    pub fn subscribe(
        mut self,
        scheduler: &Scheduler,
        store: Arc<Mutex<RecordStore>>,
        config: &DemoConfig,
    ) -> Subscription {
        scheduler.subscribe_while(config.interval_ms, move |now| {
            if self.is_finished() {
                return false;
            }
            match store.lock() {
                Ok(mut store) => {
                    self.step(&mut store, now);
                }
                Err(_) => tracing::warn!("demo: record store lock poisoned"),
            }
            if self.is_finished() {
                tracing::info!("demo: script finished");
                return false;
            }
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_interleaves_every_stream() {
        let steps = script();
        assert_eq!(steps.len(), PROMPTS.len() + OUTPUTS.len() + INTERACTIONS.len());
        assert!(matches!(steps[0], DemoStep::Prompt(_)));
        assert!(matches!(steps[1], DemoStep::Output { .. }));
        assert!(matches!(steps[2], DemoStep::Interaction { .. }));
    }

    #[test]
    fn feed_replays_whole_script() {
        let mut store = RecordStore::new(u64::MAX);
        let mut feed = DemoFeed::with_rng(0.0, StdRng::seed_from_u64(7));
        let mut now = 0;
        while feed.step(&mut store, now) {
            now += 1_000;
        }

        assert_eq!(feed.remaining(), 0);
        assert_eq!(store.records(RecordKind::Prompt).len(), PROMPTS.len());
        assert_eq!(store.records(RecordKind::Output).len(), OUTPUTS.len());
        let interactions = store.records(RecordKind::Interaction);
        assert_eq!(interactions.len(), INTERACTIONS.len());
        assert!(interactions.iter().all(|r| r.metadata.actual_tokens.is_some()));
    }

    #[test]
    fn certain_interaction_marks_every_output() {
        let mut store = RecordStore::new(u64::MAX);
        let mut feed = DemoFeed::with_rng(1.0, StdRng::seed_from_u64(7));
        let mut now = 0;
        while !feed.is_finished() {
            feed.step(&mut store, now);
            now += 1_000;
        }
        assert!(
            store
                .records(RecordKind::Output)
                .iter()
                .all(|r| r.metadata.has_interacted)
        );
    }

    #[test]
    fn zero_chance_never_marks() {
        let mut store = RecordStore::new(u64::MAX);
        let mut feed = DemoFeed::with_rng(0.0, StdRng::seed_from_u64(1));
        for now in 0..40 {
            feed.step(&mut store, now);
        }
        assert!(
            store
                .records(RecordKind::Output)
                .iter()
                .all(|r| !r.metadata.has_interacted)
        );
    }

    #[test]
    fn scheduled_feed_appends_per_tick() {
        let scheduler = Scheduler::new();
        let store = Arc::new(Mutex::new(RecordStore::new(u64::MAX)));
        let config = DemoConfig {
            enabled: true,
            interval_ms: 100,
            interaction_chance: 0.0,
        };
        let sub = DemoFeed::new(config.interaction_chance).subscribe(
            &scheduler,
            Arc::clone(&store),
            &config,
        );

        for now in [0, 100, 200] {
            scheduler.tick(now);
        }
        assert_eq!(store.lock().unwrap().len(), 3);

        drop(sub);
        scheduler.tick(300);
        assert_eq!(store.lock().unwrap().len(), 3);
    }
}
