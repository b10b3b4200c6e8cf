//! Property tests for classification, routing and formatting.
//!
//! 1. Any keyword in the text selects its tag
//! 2. Classification is never empty; `general` only appears alone
//! 3. Only providers routed from detected tags are called
//! 4. Formatter output is always framed by the markers

use agriaid_context::{
    classify, format_context, truncate, ProviderRegistry, TopicSet, TopicTag, CONTEXT_FOOTER,
    CONTEXT_HEADER,
};
use agriaid_providers::feed::FeedEntry;
use agriaid_providers::market::MARKET_PRICES;
use agriaid_providers::news::NewsArticle;
use agriaid_providers::{
    ContextBag, ContextPayload, ContextProvider, ContextSource, FetchRequest, Location,
    ProviderResult,
};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Strategies
// ============================================================================

fn topic_strategy() -> impl Strategy<Value = TopicTag> {
    prop_oneof![
        Just(TopicTag::Weather),
        Just(TopicTag::Soil),
        Just(TopicTag::Pest),
        Just(TopicTag::Crop),
        Just(TopicTag::News),
        Just(TopicTag::Price),
    ]
}

/// A keyword of the given tag, with its case scrambled.
fn keyword_of(tag: TopicTag) -> impl Strategy<Value = String> {
    let words = tag.keywords();
    (0..words.len(), any::<bool>()).prop_map(move |(i, upper)| {
        if upper {
            words[i].to_uppercase()
        } else {
            words[i].to_string()
        }
    })
}

fn free_text() -> impl Strategy<Value = String> {
    "[A-Za-z ?!,.]{0,40}"
}

fn feed_entry() -> impl Strategy<Value = FeedEntry> {
    ("[A-Za-z ]{1,30}", ".{0,300}").prop_map(|(title, summary)| FeedEntry {
        title,
        summary,
        published: None,
        link: String::new(),
    })
}

fn article() -> impl Strategy<Value = NewsArticle> {
    ".{0,250}".prop_map(|title| NewsArticle {
        title,
        description: None,
        source: "Wire".into(),
        url: "https://example.ph".into(),
        published: String::new(),
        image: None,
    })
}

fn bag_strategy() -> impl Strategy<Value = ContextBag> {
    (
        prop::option::of(prop::collection::vec(feed_entry(), 0..6)),
        prop::option::of(prop::collection::vec(article(), 0..6)),
        any::<bool>(),
    )
        .prop_map(|(forecast, news, prices)| {
            let mut bag = ContextBag::new();
            if let Some(f) = forecast {
                bag.insert(ContextPayload::PagasaForecast(f));
            }
            if let Some(n) = news {
                bag.insert(ContextPayload::News(n));
            }
            if prices {
                bag.insert(ContextPayload::MarketPrices(MARKET_PRICES));
            }
            bag
        })
}

// ============================================================================
// Counting provider
// ============================================================================

struct Counting {
    source: ContextSource,
    calls: AtomicUsize,
}

impl ContextProvider for Counting {
    fn source(&self) -> ContextSource {
        self.source
    }

    fn fetch(&self, _request: &FetchRequest) -> ProviderResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}

fn counting(source: ContextSource) -> Arc<Counting> {
    Arc::new(Counting {
        source,
        calls: AtomicUsize::new(0),
    })
}

const ROUTES: [(TopicTag, ContextSource); 6] = [
    (TopicTag::Weather, ContextSource::PagasaForecast),
    (TopicTag::Soil, ContextSource::Soil),
    (TopicTag::Pest, ContextSource::PestDatabase),
    (TopicTag::Crop, ContextSource::CropCalendar),
    (TopicTag::News, ContextSource::News),
    (TopicTag::Price, ContextSource::MarketPrices),
];

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn keyword_anywhere_selects_its_tag(
        (tag, word) in topic_strategy().prop_flat_map(|t| (Just(t), keyword_of(t))),
        before in free_text(),
        after in free_text(),
    ) {
        let text = format!("{before}{word}{after}");
        prop_assert!(classify(&text).contains(tag));
    }

    #[test]
    fn general_is_exclusive(text in ".{0,80}") {
        let topics = classify(&text);
        prop_assert!(!topics.is_empty());
        if topics.contains(TopicTag::General) {
            prop_assert_eq!(topics.len(), 1);
        }
    }

    #[test]
    fn unrouted_providers_are_never_called(
        picked in prop::collection::btree_set(topic_strategy(), 0..6)
    ) {
        let providers: Vec<_> = ROUTES.iter().map(|(t, s)| (*t, counting(*s))).collect();
        let registry = providers
            .iter()
            .fold(ProviderRegistry::new(), |r, (t, p)| r.route(*t, p.clone()));

        let topics: TopicSet = picked.iter().copied().collect();
        let request = FetchRequest::for_location(&Location::default());
        let _ = registry.gather(&topics, &request);

        for (tag, provider) in &providers {
            let expected = usize::from(picked.contains(tag));
            prop_assert_eq!(provider.calls.load(Ordering::SeqCst), expected);
        }
    }

    #[test]
    fn output_is_always_framed(bag in bag_strategy()) {
        let text = format_context(&bag);
        prop_assert!(text.starts_with(CONTEXT_HEADER));
        prop_assert!(text.ends_with(CONTEXT_FOOTER));
    }

    #[test]
    fn truncation_bounds_length(text in ".{0,400}", max in 0usize..250) {
        let cut = truncate(&text, max);
        let chars = text.chars().count();
        if chars <= max {
            prop_assert_eq!(cut, text);
        } else {
            prop_assert_eq!(cut.chars().count(), max + 3);
            prop_assert!(cut.ends_with("..."));
        }
    }
}
