//! Runs the classifier over the demo sample lines and prints what it extracts.

use chat_signal_relay::classify::PatternClassifier;
use chat_signal_relay::ingest::providers::demo::DEMO_MESSAGES;

fn main() {
    tracing_subscriber::fmt().with_target(false).init();
    let classifier = PatternClassifier::default();

    for text in DEMO_MESSAGES {
        println!("{text}");
        match classifier.analyze(text) {
            Some(a) => {
                let verdict = if a.confidence >= classifier.threshold() {
                    "accepted"
                } else {
                    "below threshold"
                };
                println!(
                    "  -> {} {} @ {}  confidence {:.2} ({verdict}) [{}]",
                    a.action,
                    a.symbol.as_deref().unwrap_or("N/A"),
                    a.price.map(|p| p.to_string()).unwrap_or_else(|| "N/A".into()),
                    a.confidence,
                    a.matched.join(", ")
                );
            }
            None => println!("  -> not a signal"),
        }
    }
}
