use std::io::{self, BufRead, Write};

use anyhow::Result;
use clap::Parser;
use svdrec::services::ingestion::Dataset;
use svdrec::utils::validation::{parse_user_id, validate_config, validate_recommendation_count};
use svdrec::{init_tracing, Config, ModelError, SvdModel, TrainedState};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Train the SVD recommender and print recommendations", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Movie titles file (overrides the config)
    #[arg(long)]
    titles: Option<String>,

    /// Ratings file (overrides the config)
    #[arg(long)]
    ratings: Option<String>,

    /// Number of SGD update steps (overrides the config)
    #[arg(long)]
    steps: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// 1-based user to recommend for; without it an interactive prompt starts
    #[arg(short, long)]
    user: Option<usize>,

    /// How many recommendations to print
    #[arg(short = 'n', long)]
    count: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    let mut config = Config::load_or_default(&args.config)?;
    if let Some(titles) = args.titles {
        config.data.movie_titles_path = titles;
    }
    if let Some(ratings) = args.ratings {
        config.data.ratings_path = ratings;
    }
    if let Some(steps) = args.steps {
        config.model.update_steps = steps;
    }
    if args.seed.is_some() {
        config.model.seed = args.seed;
    }
    validate_config(&config)?;
    info!("Training configuration: {:?}", config.model);

    let state = TrainedState::build(&config)?;
    if !state.report.rmse.is_finite() {
        warn!("RMSE is not finite; learning_rate is likely too large for this regularization");
    }
    println!("RMSE: {:.4}", state.report.rmse);
    println!("MAE: {:.4}", state.report.mae);

    let count = args.count.unwrap_or(config.recommendation.default_count);
    match args.user {
        Some(user_id) => {
            let count = validate_recommendation_count(count, &config.recommendation)?;
            let mut out = io::stdout().lock();
            print_recommendations(&mut out, &state.model, &state.dataset, user_id, count)?;
        }
        None => interactive(&state, &config)?,
    }

    Ok(())
}

fn print_recommendations<W: Write>(
    out: &mut W,
    model: &SvdModel,
    dataset: &Dataset,
    user_id: usize,
    count: usize,
) -> Result<()> {
    let recommendations = model.recommend_movies(user_id, count)?;
    if let Some(source_id) = dataset.source_user(user_id) {
        writeln!(out, "Recommendations for user {user_id} (source id {source_id}):")?;
    }
    for rec in recommendations {
        writeln!(
            out,
            "{} (predicted rating: {:.2})",
            dataset.title_for_item(rec.item_id),
            rec.score
        )?;
    }
    Ok(())
}

/// Reads user ids from stdin. `more` shows another page, `quit` exits.
fn interactive(state: &TrainedState, config: &Config) -> Result<()> {
    let rec_config = &config.recommendation;
    let stdin = io::stdin();
    let mut out = io::stdout().lock();
    let mut current: Option<(usize, usize)> = None;

    writeln!(out, "Enter a user id, `more`, or `quit`.")?;
    loop {
        write!(out, "> ")?;
        out.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();

        let (user_id, count) = match input {
            "" => continue,
            "quit" | "exit" => break,
            "more" => match current {
                Some((_, count)) if count >= rec_config.max_count => {
                    writeln!(out, "Already showing the maximum of {} recommendations.", rec_config.max_count)?;
                    continue;
                }
                Some((user_id, count)) => (user_id, (count + rec_config.page_size).min(rec_config.max_count)),
                None => {
                    writeln!(out, "Enter a user id first.")?;
                    continue;
                }
            },
            other => match parse_user_id(other) {
                Ok(user_id) => (user_id, rec_config.default_count),
                Err(e) => {
                    writeln!(out, "{e}")?;
                    continue;
                }
            },
        };

        match print_recommendations(&mut out, &state.model, &state.dataset, user_id, count) {
            Ok(()) => current = Some((user_id, count)),
            Err(e) if matches!(e.downcast_ref::<ModelError>(), Some(ModelError::UserOutOfRange { .. })) => {
                writeln!(out, "Enter a valid user ID (1..={}).", state.dataset.n_users())?;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
