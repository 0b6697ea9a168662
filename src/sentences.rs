//! Story and sentence pool
//!
//! Stories are loaded from a lenient JSON file: either `{ "stories": [...] }`
//! or a bare list. Malformed entries are skipped rather than failing the load.

use crate::error::{CoachError, CoachResult};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const RECENT_STORIES: usize = 8;
const RECENT_PHONEMES: usize = 12;
/// Phonemes that wear children out faster once they recur
const TIRING_PHONEMES: [&str; 2] = ["CH", "ʃ"];

/// One phrase to repeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    pub text: String,
    #[serde(default)]
    pub target_word: String,
    #[serde(default)]
    pub phoneme_target: String,
    #[serde(default)]
    pub phoneme_contrast: String,
}

impl Sentence {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            target_word: String::new(),
            phoneme_target: String::new(),
            phoneme_contrast: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Story {
    pub id: String,
    pub title: String,
    pub goal: String,
    pub tags: Vec<String>,
    pub weight: f64,
    pub sentences: Vec<Arc<Sentence>>,
}

impl Story {
    /// Phoneme the story trains, taken from its first sentence.
    pub fn main_phoneme(&self) -> &str {
        self.sentences
            .first()
            .map(|s| s.phoneme_target.as_str())
            .unwrap_or("")
    }
}

#[derive(Debug, Default)]
pub struct SentencePool {
    stories: Vec<Story>,
    recent_story_ids: VecDeque<String>,
    recent_phonemes: VecDeque<String>,
}

impl SentencePool {
    pub fn new(stories: Vec<Story>) -> Self {
        Self {
            stories,
            ..Self::default()
        }
    }

    /// Load stories from disk. A missing file yields an empty pool.
    pub fn load(path: &Path) -> CoachResult<Self> {
        if !path.exists() {
            info!("📚 No stories file at {}", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let pool = Self::from_json(&content)?;
        info!("📚 Loaded {} stories from {}", pool.len(), path.display());
        Ok(pool)
    }

    pub fn from_json(content: &str) -> CoachResult<Self> {
        let data: Value = serde_json::from_str(content)?;
        let items = match &data {
            Value::Object(map) => map
                .get("stories")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            Value::Array(items) => items.clone(),
            _ => Vec::new(),
        };
        let stories = items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| coerce_story(i, item))
            .collect();
        Ok(Self::new(stories))
    }

    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Story> {
        self.stories.iter().find(|s| s.id == id)
    }

    fn story_weight(&self, story: &Story, rng: &mut impl Rng) -> f64 {
        let mut w = story.weight.max(0.05);
        if self.recent_story_ids.contains(&story.id) {
            w *= 0.25;
        }
        let phoneme = story.main_phoneme().to_uppercase();
        if !phoneme.is_empty() {
            let uses = self
                .recent_phonemes
                .iter()
                .filter(|p| p.to_uppercase() == phoneme)
                .count();
            w *= 0.85f64.powi(uses as i32);
            if uses >= 2 && TIRING_PHONEMES.iter().any(|p| p.to_uppercase() == phoneme) {
                w *= 0.6;
            }
        }
        w *= rng.gen_range(0.80..=1.20);
        w.max(0.01)
    }

    /// Weighted pick that favours stories and phonemes not seen recently.
    pub fn pick_story(&mut self) -> CoachResult<Story> {
        let mut rng = rand::thread_rng();
        let weights: Vec<f64> = self
            .stories
            .iter()
            .map(|s| self.story_weight(s, &mut rng))
            .collect();
        let dist = WeightedIndex::new(&weights).map_err(|_| CoachError::NoSentences)?;
        let chosen = self.stories[dist.sample(&mut rng)].clone();

        push_bounded(&mut self.recent_story_ids, chosen.id.clone(), RECENT_STORIES);
        let phoneme = chosen.main_phoneme();
        if !phoneme.is_empty() {
            push_bounded(&mut self.recent_phonemes, phoneme.to_string(), RECENT_PHONEMES);
        }
        debug!("📖 Picked story '{}' ({})", chosen.title, chosen.id);
        Ok(chosen)
    }
}

fn push_bounded(queue: &mut VecDeque<String>, value: String, cap: usize) {
    if queue.len() == cap {
        queue.pop_front();
    }
    queue.push_back(value);
}

fn first_str(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_array)
        .and_then(|list| list.first())
        .map(|v| match v {
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}

fn str_field(item: &Value, key: &str) -> String {
    item.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn coerce_story(index: usize, item: &Value) -> Option<Story> {
    let raw_sentences = item.get("sentences")?.as_array()?;
    let phoneme_target = first_str(item.get("target_phonemes"));
    let phoneme_contrast = first_str(item.get("contrast_phonemes"));

    let sentences: Vec<Arc<Sentence>> = raw_sentences
        .iter()
        .filter_map(|s| match s {
            Value::String(text) if !text.trim().is_empty() => Some(Sentence {
                text: text.trim().to_string(),
                target_word: String::new(),
                phoneme_target: phoneme_target.clone(),
                phoneme_contrast: phoneme_contrast.clone(),
            }),
            Value::Object(_) => {
                let text = str_field(s, "text");
                if text.is_empty() {
                    return None;
                }
                let or_default = |key: &str, default: &str| {
                    let v = str_field(s, key);
                    if v.is_empty() {
                        default.to_string()
                    } else {
                        v
                    }
                };
                Some(Sentence {
                    text,
                    target_word: str_field(s, "target_word"),
                    phoneme_target: or_default("phoneme_target", &phoneme_target),
                    phoneme_contrast: or_default("phoneme_contrast", &phoneme_contrast),
                })
            }
            _ => None,
        })
        .map(Arc::new)
        .collect();

    if sentences.is_empty() {
        return None;
    }

    let mut id = str_field(item, "id");
    if id.is_empty() {
        id = str_field(item, "story_id");
    }
    if id.is_empty() {
        id = format!("story_{}", index + 1);
    }
    let mut title = str_field(item, "title");
    if title.is_empty() {
        title = id.clone();
    }
    let tags = item
        .get("tags")
        .and_then(Value::as_array)
        .map(|t| {
            t.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let weight = item
        .get("weight")
        .and_then(Value::as_f64)
        .filter(|w| *w != 0.0)
        .unwrap_or(1.0);

    Some(Story {
        id,
        title,
        goal: str_field(item, "goal"),
        tags,
        weight,
        sentences,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const STORIES: &str = r#"{
        "stories": [
            {
                "id": "chat",
                "title": "Le chat",
                "goal": "Bien dire le son CH",
                "weight": 2.0,
                "target_phonemes": ["CH"],
                "contrast_phonemes": ["S"],
                "sentences": [
                    "Le chat dort.",
                    { "text": "Le chien chante.", "target_word": "chien" },
                    { "text": "  " },
                    { "text": "Sacha sort.", "phoneme_target": "S", "phoneme_contrast": "CH" }
                ]
            },
            { "id": "empty", "sentences": [] },
            { "title": "Sans id", "sentences": ["Bonjour."] },
            "not a story"
        ]
    }"#;

    #[test]
    fn test_load_coerces_stories() {
        let pool = SentencePool::from_json(STORIES).expect("parse");
        assert_eq!(pool.len(), 2);

        let chat = pool.get("chat").expect("chat story");
        assert_eq!(chat.goal, "Bien dire le son CH");
        assert_eq!(chat.sentences.len(), 3);
        assert_eq!(chat.sentences[0].phoneme_target, "CH");
        assert_eq!(chat.sentences[0].phoneme_contrast, "S");
        assert_eq!(chat.sentences[1].target_word, "chien");
        assert_eq!(chat.sentences[2].phoneme_target, "S");

        let untitled = &pool.stories()[1];
        assert_eq!(untitled.id, "story_3");
        assert_eq!(untitled.title, "Sans id");
        assert_eq!(untitled.weight, 1.0);
    }

    #[test]
    fn test_bare_list_is_accepted() {
        let pool = SentencePool::from_json(r#"[{"id": "a", "sentences": ["Un."]}]"#)
            .expect("parse");
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_missing_file_gives_empty_pool() {
        let pool = SentencePool::load(Path::new("/nonexistent/stories.json")).expect("load");
        assert!(pool.is_empty());
    }

    #[test]
    fn test_pick_on_empty_pool_fails() {
        let mut pool = SentencePool::default();
        assert!(matches!(pool.pick_story(), Err(CoachError::NoSentences)));
    }

    fn story(id: &str, phoneme: &str) -> Story {
        let mut sentence = Sentence::new("Une phrase.");
        sentence.phoneme_target = phoneme.to_string();
        Story {
            id: id.to_string(),
            title: id.to_string(),
            goal: String::new(),
            tags: Vec::new(),
            weight: 1.0,
            sentences: vec![Arc::new(sentence)],
        }
    }

    fn weight_after(history: &[&str], story: &Story) -> f64 {
        let mut pool = SentencePool::new(vec![story.clone()]);
        pool.recent_phonemes = history.iter().map(|p| p.to_string()).collect();
        pool.story_weight(story, &mut StdRng::seed_from_u64(11))
    }

    #[test]
    fn test_recurring_ch_is_penalised() {
        let ch = story("ch", "CH");
        let s = story("s", "S");
        let ratio = weight_after(&["CH", "CH"], &ch) / weight_after(&["S", "S"], &s);
        assert!((ratio - 0.6).abs() < 1e-9, "ratio={ratio}");

        let sh = story("sh", "ʃ");
        let ratio = weight_after(&["ʃ", "ʃ"], &sh) / weight_after(&["S", "S"], &s);
        assert!((ratio - 0.6).abs() < 1e-9, "ratio={ratio}");

        // a single recent use only decays
        let ratio = weight_after(&["CH"], &ch) / weight_after(&["S"], &s);
        assert!((ratio - 1.0).abs() < 1e-9, "ratio={ratio}");
    }

    #[test]
    fn test_pick_tracks_recent_history() {
        let mut pool = SentencePool::from_json(STORIES).expect("parse");
        for _ in 0..20 {
            let story = pool.pick_story().expect("pick");
            assert!(pool.get(&story.id).is_some());
        }
        assert_eq!(pool.recent_story_ids.len(), RECENT_STORIES);
        assert!(pool.recent_phonemes.len() <= RECENT_PHONEMES);
    }
}
