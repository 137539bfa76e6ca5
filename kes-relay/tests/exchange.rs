//! End-to-end exchange behavior through the public API.

use kes_relay::config::Config;
use kes_relay::{is_valid_key, Identity, KeyRegistry, KeyRelay, Outcome};
use spki::der::pem::LineEnding;
use spki::EncodePublicKey;
use std::sync::Arc;

fn fresh_key() -> String {
    ed25519_dalek::SigningKey::from_bytes(&rand::random())
        .verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .unwrap()
}

#[tokio::test]
async fn publish_then_lookup_round_trip() {
    let registry = KeyRegistry::new();
    let key = fresh_key();

    assert_eq!(
        registry.handle(&Identity::from("A"), &key).await,
        Outcome::Stored
    );
    assert_eq!(
        registry.handle(&Identity::from("B"), "A").await,
        Outcome::Resolved(key)
    );
}

#[tokio::test]
async fn overwrite_keeps_only_latest() {
    let registry = KeyRegistry::new();
    let alice = Identity::from("alice");
    let (k1, k2) = (fresh_key(), fresh_key());

    registry.handle(&alice, &k1).await;
    registry.handle(&alice, &k2).await;

    let stored = registry.get("alice").await.unwrap();
    assert_eq!(stored.as_str(), k2);
    assert!(!stored.as_str().contains(&k1));
}

#[tokio::test]
async fn miss_produces_no_reply() {
    let relay = KeyRelay::new(Config::default(), KeyRegistry::new());

    let outcome = relay
        .handle_message(&Identity::from("B"), "nonexistent-id")
        .await;

    assert_eq!(outcome, Outcome::NotFound);
    assert_eq!(relay.reply_for(outcome), None);
}

#[tokio::test]
async fn resolved_reply_is_the_published_text() {
    let relay = KeyRelay::new(Config::default(), KeyRegistry::new());
    let key = fresh_key();

    let stored = relay.handle_message(&Identity::from("A"), &key).await;
    assert_eq!(relay.reply_for(stored), None);

    let resolved = relay.handle_message(&Identity::from("B"), "A").await;
    assert_eq!(relay.reply_for(resolved), Some(key));
}

#[tokio::test]
async fn garbage_never_panics_and_never_stores() {
    let registry = KeyRegistry::new();
    let sender = Identity::from("fuzzer");
    let key = fresh_key();

    let inputs = [
        String::new(),
        "not a key".to_string(),
        "-----BEGIN PUBLIC KEY-----".to_string(),
        "-----BEGIN PUBLIC KEY-----\n-----END PUBLIC KEY-----".to_string(),
        key[..key.len() - 10].to_string(),
        key.replace('A', "*"),
        "\u{fffd}\u{0}\u{7f}".repeat(100),
    ];

    for input in &inputs {
        assert!(!is_valid_key(input), "accepted: {:?}", input);
        assert_eq!(registry.handle(&sender, input).await, Outcome::NotFound);
    }
    assert!(registry.is_empty().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_store_and_lookup_are_linearizable() {
    let registry = Arc::new(KeyRegistry::new());
    let keys: Vec<String> = (0..8).map(|_| fresh_key()).collect();

    let writer = {
        let registry = registry.clone();
        let keys = keys.clone();
        tokio::spawn(async move {
            let alice = Identity::from("A");
            for _ in 0..25 {
                for key in &keys {
                    assert_eq!(registry.handle(&alice, key).await, Outcome::Stored);
                }
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|i| {
            let registry = registry.clone();
            let keys = keys.clone();
            tokio::spawn(async move {
                let reader = Identity::new(format!("reader-{}", i));
                for _ in 0..200 {
                    match registry.handle(&reader, "A").await {
                        Outcome::NotFound => {}
                        Outcome::Resolved(seen) => {
                            assert!(keys.contains(&seen), "torn read: {:?}", seen)
                        }
                        Outcome::Stored => panic!("lookup text was stored"),
                    }
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }

    assert_eq!(
        registry.get("A").await.map(|r| r.into_string()),
        keys.last().cloned()
    );
}

#[tokio::test]
async fn many_senders_are_isolated() {
    let registry = KeyRegistry::new();
    let mut published = Vec::new();

    for i in 0..20 {
        let key = fresh_key();
        registry
            .handle(&Identity::new(format!("peer-{}", i)), &key)
            .await;
        published.push(key);
    }

    assert_eq!(registry.len().await, 20);
    for (i, key) in published.into_iter().enumerate() {
        assert_eq!(
            registry
                .handle(&Identity::from("asker"), &format!("peer-{}", i))
                .await,
            Outcome::Resolved(key)
        );
    }
}

#[tokio::test]
async fn reflowed_key_is_stored_and_returned_verbatim() {
    let registry = KeyRegistry::new();
    let key = fresh_key();
    // Chat clients tend to join the PEM lines and use CRLF
    let reflowed = key.trim_end().replace('\n', " ") + "\r\n";

    assert_eq!(
        registry.handle(&Identity::from("A"), &reflowed).await,
        Outcome::Stored
    );
    assert_eq!(
        registry.handle(&Identity::from("B"), "A").await,
        Outcome::Resolved(reflowed)
    );
}
