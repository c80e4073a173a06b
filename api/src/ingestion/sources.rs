//! The static table of configured RSS feeds. Ingestion never crawls beyond
//! this table.

use crate::lean::Lean;

pub struct FeedSource {
    pub name: &'static str,
    pub feed_url: &'static str,
    pub lean: Lean,
}

pub const FEEDS: &[FeedSource] = &[
    FeedSource {
        name: "The Daily Current",
        feed_url: "https://dailycurrent.example/rss/politics.xml",
        lean: Lean::Progressive,
    },
    FeedSource {
        name: "Harbor Herald",
        feed_url: "https://harborherald.example/feeds/politics.xml",
        lean: Lean::Progressive,
    },
    FeedSource {
        name: "Civic Ledger",
        feed_url: "https://civicledger.example/rss",
        lean: Lean::Progressive,
    },
    FeedSource {
        name: "Plainsview Post",
        feed_url: "https://plainsviewpost.example/politics/feed",
        lean: Lean::Progressive,
    },
    FeedSource {
        name: "The Open Record",
        feed_url: "https://theopenrecord.example/rss/politics",
        lean: Lean::Progressive,
    },
    FeedSource {
        name: "The National Sentinel",
        feed_url: "https://nationalsentinel.example/feed/politics",
        lean: Lean::Conservative,
    },
    FeedSource {
        name: "Liberty Wire",
        feed_url: "https://libertywire.example/rss.xml",
        lean: Lean::Conservative,
    },
    FeedSource {
        name: "Heartland Register",
        feed_url: "https://heartlandregister.example/feeds/politics.xml",
        lean: Lean::Conservative,
    },
    FeedSource {
        name: "The Constitutionalist",
        feed_url: "https://constitutionalist.example/rss/politics",
        lean: Lean::Conservative,
    },
    FeedSource {
        name: "Frontier Tribune",
        feed_url: "https://frontiertribune.example/politics/rss",
        lean: Lean::Conservative,
    },
    FeedSource {
        name: "Wire Service Daily",
        feed_url: "https://wireservicedaily.example/rss/politics.xml",
        lean: Lean::Centrist,
    },
    FeedSource {
        name: "The Balance Report",
        feed_url: "https://thebalancereport.example/feed",
        lean: Lean::Centrist,
    },
    FeedSource {
        name: "Capitol Briefing",
        feed_url: "https://capitolbriefing.example/rss.xml",
        lean: Lean::Centrist,
    },
    FeedSource {
        name: "Crossline News",
        feed_url: "https://crosslinenews.example/politics/feed",
        lean: Lean::Centrist,
    },
];

pub fn by_name(name: &str) -> Option<&'static FeedSource> {
    FEEDS.iter().find(|f| f.name == name)
}
