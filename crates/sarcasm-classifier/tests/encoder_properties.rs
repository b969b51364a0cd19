//! Property tests for fixed-length example encoding

mod common;

use proptest::prelude::*;
use sarcasm_classifier::ExampleEncoder;
use sarcasm_core::Label;

fn encoder(max_length: usize) -> ExampleEncoder {
    ExampleEncoder::new(common::tokenizer(), max_length).unwrap()
}

proptest! {
    #[test]
    fn prop_output_is_always_max_length(text in ".{0,400}", max_length in 4usize..160) {
        let encoded = encoder(max_length).encode(text.as_str(), "sarcastic").unwrap();
        prop_assert_eq!(encoded.token_ids.len(), max_length);
        prop_assert_eq!(encoded.attention_mask.len(), max_length);
        prop_assert!(encoded.attention_mask.iter().all(|&m| m <= 1));
    }

    #[test]
    fn prop_mask_is_a_prefix_of_ones(words in prop::collection::vec("[a-z]{1,8}", 0..40)) {
        let encoded = encoder(16).encode(words.join(" ").as_str(), "x").unwrap();
        let real = encoded.real_tokens();
        prop_assert!(encoded.attention_mask[..real].iter().all(|&m| m == 1));
        prop_assert!(encoded.attention_mask[real..].iter().all(|&m| m == 0));
        prop_assert_eq!(real, (words.len() + 2).min(16));
    }

    #[test]
    fn prop_only_exact_token_is_sarcastic(token in "\\PC{0,20}") {
        let encoded = encoder(8).encode("area man", token.as_str()).unwrap();
        let expected = if token == Label::SARCASTIC_TOKEN { 1 } else { 0 };
        prop_assert_eq!(encoded.label, expected);
    }

    #[test]
    fn prop_numbers_encode_like_their_text(n in any::<i64>()) {
        let enc = encoder(10);
        let from_number = enc.encode(&n, "sarcastic").unwrap();
        let from_text = enc.encode(n.to_string().as_str(), "sarcastic").unwrap();
        prop_assert_eq!(from_number, from_text);
    }
}

#[test]
fn default_length_is_128() {
    let enc = ExampleEncoder::new(common::tokenizer(), sarcasm_classifier::encoder::DEFAULT_MAX_LENGTH)
        .unwrap();
    let encoded = enc.encode("area man", "sarcastic").unwrap();
    assert_eq!(encoded.len(), 128);
    assert_eq!(encoded.label, 1);
}

#[test]
fn label_mapping_is_exact() {
    let enc = encoder(8);
    for (token, expected) in [
        ("sarcastic", 1),
        ("Sarcastic", 0),
        (" sarcastic", 0),
        ("not_sarcastic", 0),
        ("1", 0),
        ("", 0),
    ] {
        assert_eq!(enc.encode("area man", token).unwrap().label, expected, "{:?}", token);
    }
}
