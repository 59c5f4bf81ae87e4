use clap::Parser;
use faqdex::{
    DataDir,
    KnowledgeBase,
    Settings,
    cli::{self, Cli, Command, SettingsAction},
    error::{self, Error},
    loader,
    tags,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("FAQDEX_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let kb = KnowledgeBase::open(&data_dir)?;
    let settings = Settings::load(kb.store())?;
    let kb = kb.with_tag_match(settings.tag_match);

    match cli.command {
        Command::Import(args) => cmd_import(&kb, &args)?,
        Command::Search(args) => cmd_search(&kb, &settings, &args)?,
        Command::Get(args) => cmd_get(&kb, &args)?,
        Command::Tags(args) => cmd_tags(&kb, &settings, &args)?,
        Command::Browse(args) => cmd_browse(&kb, &settings, &args)?,
        Command::Rebuild => {
            let count = kb.rebuild()?;
            println!("Indexed {count} entries");
        }
        Command::Status(args) => cmd_status(&kb, &data_dir, args.json)?,
        Command::Settings { action } => cmd_settings(&kb, &settings, action)?,
        Command::Completions(_) => {}
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> error::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_import(kb: &KnowledgeBase, args: &cli::ImportArgs) -> error::Result<()> {
    let report = loader::load_csv(kb, &args.path)?;
    if args.json {
        print_json(&report)?;
    } else {
        println!(
            "Imported {} entries; full-text index rebuilt (generation {})",
            report.inserted, report.generation
        );
    }
    Ok(())
}

fn cmd_search(
    kb: &KnowledgeBase,
    settings: &Settings,
    args: &cli::SearchArgs,
) -> error::Result<()> {
    let query = args.query.trim();
    if query.chars().count() < settings.min_query_chars {
        return Err(Error::InvalidArgument(format!(
            "query must be at least {} characters",
            settings.min_query_chars
        )));
    }

    let limit = args.count.unwrap_or(settings.search_limit);
    let hits = kb.search(query, limit)?;

    if args.json {
        return print_json(&hits);
    }
    if hits.is_empty() {
        println!("No matches. Try rephrasing, or browse with `faqdex tags`.");
        return Ok(());
    }
    for (i, hit) in hits.iter().enumerate() {
        println!("{:>3}. [{}] {}", i + 1, hit.id, hit.question);
        for line in hit.answer.lines() {
            println!("     {line}");
        }
    }
    println!("\n{} result(s)", hits.len());
    Ok(())
}

fn cmd_get(kb: &KnowledgeBase, args: &cli::GetArgs) -> error::Result<()> {
    let entry = kb.get_by_id(args.id)?.ok_or_else(|| Error::NotFound {
        kind: "entry",
        name: args.id.to_string(),
    })?;

    if args.json {
        return print_json(&entry);
    }
    println!("{} {}", entry.id, entry.question);
    println!();
    println!("{}", entry.answer);
    let tags = entry.tag_list();
    if !tags.is_empty() {
        println!();
        let rendered: Vec<String> = tags.iter().map(|t| format!("#{t}")).collect();
        println!("{}", rendered.join(" "));
    }
    Ok(())
}

fn cmd_tags(
    kb: &KnowledgeBase,
    settings: &Settings,
    args: &cli::TagsArgs,
) -> error::Result<()> {
    // One snapshot, paged locally, so every page comes from the same load.
    let all = kb.all_tags(settings.tag_list_limit)?;

    if args.json {
        return print_json(&all);
    }
    if all.is_empty() {
        println!("No tags yet. Import a CSV with a tags column.");
        return Ok(());
    }

    let per_page = settings.tags_per_page;
    let page = args.page.saturating_sub(1);
    let pages = all.len().div_ceil(per_page);
    let shown = tags::paginate(&all, page, per_page);

    println!("Tags (page {} of {pages}):", page + 1);
    for tag in shown {
        println!("  #{tag}");
    }
    if page > 0 {
        println!("previous: --page {page}");
    }
    if (page + 1).saturating_mul(per_page) < all.len() {
        println!("next: --page {}", page + 2);
    }
    Ok(())
}

fn cmd_browse(
    kb: &KnowledgeBase,
    settings: &Settings,
    args: &cli::BrowseArgs,
) -> error::Result<()> {
    let page_size = args.page_size.unwrap_or(settings.page_size);
    let page = kb.list_by_tag(&args.tag, args.page.saturating_sub(1), page_size)?;

    if args.json {
        return print_json(&page);
    }
    if page.total == 0 {
        println!("No questions tagged '{}'.", args.tag);
        return Ok(());
    }

    println!("Tag: #{}", page.tag);
    if page.items.is_empty() {
        println!(
            "Page {} is past the end ({} question(s), {} page(s)).",
            page.page + 1,
            page.total,
            page.page_count()
        );
        return Ok(());
    }
    println!(
        "Questions {}-{} of {}:",
        page.first_position(),
        page.last_position(),
        page.total
    );
    for item in &page.items {
        println!("  {:>5}  {}", item.id.to_string(), item.question);
    }
    if page.has_prev() {
        println!("previous: --page {}", page.page);
    }
    if page.has_next() {
        println!("next: --page {}", page.page + 2);
    }
    Ok(())
}

fn cmd_status(
    kb: &KnowledgeBase,
    data_dir: &DataDir,
    json: bool,
) -> error::Result<()> {
    let status = kb.status()?;

    if json {
        return print_json(&serde_json::json!({
            "data_dir": data_dir.root(),
            "data_dir_source": data_dir.source(),
            "entries": status.entries,
            "generation": status.generation,
            "indexed_generation": status.indexed_generation,
            "indexed_documents": status.indexed_documents,
            "ranking": status.ranking,
            "stale": status.is_stale(),
        }));
    }

    println!("Data directory: {data_dir}");
    println!("Entries: {}", status.entries);
    println!("Load generation: {}", status.generation);
    match status.indexed_generation {
        Some(generation) => println!(
            "Index: {} documents (generation {generation})",
            status.indexed_documents
        ),
        None => println!("Index: never built"),
    }
    println!("Ranking: {:?}", status.ranking);
    if status.is_stale() {
        println!("Index is stale; run `faqdex rebuild`.");
    }
    Ok(())
}

fn cmd_settings(
    kb: &KnowledgeBase,
    settings: &Settings,
    action: SettingsAction,
) -> error::Result<()> {
    match action {
        SettingsAction::Show { json } => {
            if json {
                return print_json(settings);
            }
            println!("search_limit: {}", settings.search_limit);
            println!("min_query_chars: {}", settings.min_query_chars);
            println!("tag_list_limit: {}", settings.tag_list_limit);
            println!("tags_per_page: {}", settings.tags_per_page);
            println!("page_size: {}", settings.page_size);
            println!("tag_match: {}", settings.tag_match.as_str());
        }
        SettingsAction::Set { key, value } => {
            Settings::set(kb.store(), &key, &value)?;
            println!("Set {key} = {value}");
        }
        SettingsAction::Clear { key } => {
            if Settings::clear(kb.store(), &key)? {
                println!("Cleared {key}");
            } else {
                println!("{key} was not set");
            }
        }
    }
    Ok(())
}
