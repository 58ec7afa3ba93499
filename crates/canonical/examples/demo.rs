use canonical::{NormalizeConfig, fingerprint_tokens, normalize_tokens};

fn main() {
    let text = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "The <b>Senators</b> were running 12 investigations, reportedly.".to_string());

    let cfg = NormalizeConfig::default();
    let tokens = normalize_tokens(&text, &cfg).expect("default config is valid");
    println!("tokens: {tokens:?}");
    println!("fingerprint: {}", fingerprint_tokens(&tokens).to_hex());

    let unstemmed = normalize_tokens(&text, &cfg.clone().with_stemming(false)).expect("valid config");
    println!("unstemmed: {unstemmed:?}");
}
