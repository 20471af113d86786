use ccgraph::index::Language;

pub fn list_languages() {
    println!("Supported languages:");
    for language in [Language::C, Language::Cpp] {
        let extensions = match language {
            Language::C => Language::C_EXTENSIONS,
            Language::Cpp => Language::CPP_EXTENSIONS,
        };
        let listed: Vec<String> = extensions.iter().map(|ext| format!(".{}", ext)).collect();
        println!("  {:<4} {}", language.as_str(), listed.join(" "));
    }

    let headers: Vec<String> = Language::HEADER_EXTENSIONS
        .iter()
        .map(|ext| format!(".{}", ext))
        .collect();
    println!("\nHeaders ({}) are skipped with --no-headers.", headers.join(" "));
}
