use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use collab::{Neighbor, RankedRecommendation, RecommendationAggregator, SimilarityEngine, SimilarityMetric};
use colored::Colorize;
use data_loader::{DataIndex, MovieId, UserId};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// cf-recs - neighborhood-based movie recommendations
#[derive(Parser)]
#[command(name = "cf-recs")]
#[command(about = "Movie recommendations from the k most similar users", long_about = None)]
struct Cli {
    /// Path to a MovieLens dataset directory (ratings.dat, movies.dat)
    #[arg(short, long, default_value = "data/ml-1m")]
    data_dir: PathBuf,

    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a user's ratings and the movies recommended to them
    Recommend {
        /// User ID to get recommendations for
        #[arg(long)]
        user_id: UserId,

        /// Number of nearest neighbors to aggregate over
        #[arg(short, long, default_value = "20")]
        k: usize,

        /// Similarity metric: pearson (1) or cosine (2)
        #[arg(short, long, default_value = "pearson")]
        metric: SimilarityMetric,

        /// Number of recommendations to show
        #[arg(long, default_value = "5")]
        limit: usize,

        /// Show which neighbors contributed to each recommendation
        #[arg(long)]
        explain: bool,
    },

    /// List the k users most similar to a user
    Neighbors {
        #[arg(long)]
        user_id: UserId,

        #[arg(short, long, default_value = "20")]
        k: usize,

        #[arg(short, long, default_value = "pearson")]
        metric: SimilarityMetric,
    },

    /// Time recommendation queries for random users
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,

        /// Number of requests in flight at once
        #[arg(long, default_value = "10")]
        concurrent: usize,

        #[arg(short, long, default_value = "20")]
        k: usize,

        #[arg(short, long, default_value = "pearson")]
        metric: SimilarityMetric,
    },
}

#[derive(Serialize)]
struct RatedMovie {
    movie_id: MovieId,
    title: String,
    rating: f32,
}

#[derive(Serialize)]
struct RecommendationView {
    movie_id: MovieId,
    title: String,
    predicted_score: f64,
    contributors: usize,
}

#[derive(Serialize)]
struct RecommendReport {
    user_id: UserId,
    metric: SimilarityMetric,
    k: usize,
    ratings: Vec<RatedMovie>,
    neighbors: Vec<Neighbor>,
    recommendations: Vec<RecommendationView>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let start = Instant::now();
    let data_index = Arc::new(
        DataIndex::load_from_files(&cli.data_dir)
            .with_context(|| format!("Failed to load dataset from {}", cli.data_dir.display()))?,
    );
    info!("Loaded dataset in {:?}", start.elapsed());

    match cli.command {
        Commands::Recommend {
            user_id,
            k,
            metric,
            limit,
            explain,
        } => handle_recommend(data_index, user_id, k, metric, limit, explain, cli.json).await?,
        Commands::Neighbors { user_id, k, metric } => {
            handle_neighbors(data_index, user_id, k, metric, cli.json).await?
        }
        Commands::Benchmark {
            requests,
            concurrent,
            k,
            metric,
        } => handle_benchmark(data_index, requests, concurrent, k, metric).await?,
    }

    Ok(())
}

/// Run a query on the blocking pool, raising its cancel flag on Ctrl-C.
async fn run_query<T, F>(query: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(Arc<AtomicBool>) -> collab::Result<T> + Send + 'static,
{
    let cancel = Arc::new(AtomicBool::new(false));
    let watcher = {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling query");
                cancel.store(true, Ordering::SeqCst);
            }
        })
    };

    let outcome = tokio::task::spawn_blocking(move || query(cancel)).await;
    watcher.abort();

    Ok(outcome.context("Query task panicked")??)
}

fn movie_title(data_index: &DataIndex, movie_id: MovieId) -> String {
    data_index
        .get_movie(movie_id)
        .map(|m| m.title.clone())
        .unwrap_or_else(|| format!("Movie {}", movie_id))
}

/// Handle the 'recommend' command
async fn handle_recommend(
    data_index: Arc<DataIndex>,
    user_id: UserId,
    k: usize,
    metric: SimilarityMetric,
    limit: usize,
    explain: bool,
    json: bool,
) -> Result<()> {
    let index = Arc::clone(&data_index);
    let (neighbors, recommendations) = run_query(move |cancel| {
        let engine = SimilarityEngine::new(Arc::clone(&index), Arc::clone(&index));
        let neighbors = engine.compute_top_k_neighbors_with_cancel(user_id, k, metric, Some(cancel))?;
        let recommendations = RecommendationAggregator::new(index).recommend(user_id, &neighbors);
        Ok((neighbors, recommendations))
    })
    .await
    .with_context(|| format!("Failed to recommend for user {}", user_id))?;

    let top: Vec<RankedRecommendation> = recommendations.into_iter().take(limit).collect();

    if json {
        let report = RecommendReport {
            user_id,
            metric,
            k,
            ratings: data_index
                .get_user_ratings(user_id)
                .iter()
                .map(|r| RatedMovie {
                    movie_id: r.movie_id,
                    title: movie_title(&data_index, r.movie_id),
                    rating: r.rating,
                })
                .collect(),
            recommendations: top
                .iter()
                .map(|rec| RecommendationView {
                    movie_id: rec.movie_id,
                    title: movie_title(&data_index, rec.movie_id),
                    predicted_score: rec.predicted_score,
                    contributors: rec.contributors,
                })
                .collect(),
            neighbors,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_user_ratings(&data_index, user_id);
    println!(
        "{}",
        format!("Top {} (or less) Movie Recommendations [{}, k={}]:", limit, metric, k)
            .bold()
            .blue()
    );
    println!("----------------------------------------");
    if top.is_empty() {
        println!("No recommendations: none of the {} neighbors rated an unseen movie.", neighbors.len());
    }

    let aggregator = RecommendationAggregator::new(Arc::clone(&data_index));
    for (rank, rec) in top.iter().enumerate() {
        println!(
            "{}. {} - predicted {:.2} ({} neighbors)",
            (rank + 1).to_string().green(),
            movie_title(&data_index, rec.movie_id),
            rec.predicted_score,
            rec.contributors
        );
        if explain {
            for part in aggregator.explain(user_id, rec.movie_id, &neighbors) {
                println!(
                    "   user {} (similarity {:.3}) rated {}",
                    part.user_id, part.similarity, part.rating
                );
            }
        }
    }
    println!("============================================================");

    Ok(())
}

fn print_user_ratings(data_index: &DataIndex, user_id: UserId) {
    println!("{}", format!("Movie Ratings of User {}:", user_id).bold().blue());
    println!("----------------------------------------");
    for rating in data_index.get_user_ratings(user_id) {
        println!(
            "{} {}",
            movie_title(data_index, rating.movie_id),
            rating.rating.to_string().cyan()
        );
    }
    println!("============================================================");
}

/// Handle the 'neighbors' command
async fn handle_neighbors(
    data_index: Arc<DataIndex>,
    user_id: UserId,
    k: usize,
    metric: SimilarityMetric,
    json: bool,
) -> Result<()> {
    let neighbors = run_query(move |cancel| {
        SimilarityEngine::new(Arc::clone(&data_index), data_index)
            .compute_top_k_neighbors_with_cancel(user_id, k, metric, Some(cancel))
    })
    .await
    .with_context(|| format!("Failed to find neighbors of user {}", user_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&neighbors)?);
        return Ok(());
    }

    println!(
        "{}",
        format!("{} nearest neighbors of user {} [{}]:", neighbors.len(), user_id, metric)
            .bold()
            .blue()
    );
    for (rank, neighbor) in neighbors.iter().rev().enumerate() {
        println!(
            "{}. user {} - similarity {:.4}",
            (rank + 1).to_string().green(),
            neighbor.user_id,
            neighbor.similarity
        );
    }
    Ok(())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(
    data_index: Arc<DataIndex>,
    requests: usize,
    concurrent: usize,
    k: usize,
    metric: SimilarityMetric,
) -> Result<()> {
    if requests == 0 {
        bail!("--requests must be at least 1");
    }
    let user_ids = data_index.get_all_user_ids();
    if user_ids.is_empty() {
        bail!("Dataset has no users to benchmark");
    }

    let engine = Arc::new(SimilarityEngine::new(Arc::clone(&data_index), Arc::clone(&data_index)));
    let aggregator = Arc::new(RecommendationAggregator::new(Arc::clone(&data_index)));
    let permits = Arc::new(Semaphore::new(concurrent.max(1)));

    let wall_clock = Instant::now();
    let mut handles = Vec::with_capacity(requests);
    for _ in 0..requests {
        let user_id = user_ids[rand::random::<u32>() as usize % user_ids.len()];
        let engine = Arc::clone(&engine);
        let aggregator = Arc::clone(&aggregator);
        let permits = Arc::clone(&permits);

        handles.push(tokio::spawn(async move {
            let _permit = permits.acquire_owned().await?;
            let elapsed = tokio::task::spawn_blocking(move || {
                let start = Instant::now();
                let neighbors = engine.compute_top_k_neighbors(user_id, k, metric)?;
                aggregator.recommend(user_id, &neighbors);
                Ok::<_, anyhow::Error>(start.elapsed())
            })
            .await??;
            Ok::<_, anyhow::Error>(elapsed)
        }));
    }

    let mut timings: Vec<Duration> = Vec::with_capacity(requests);
    for handle in handles {
        timings.push(handle.await??);
    }
    let total_time = wall_clock.elapsed();

    timings.sort();
    let latency_sum: Duration = timings.iter().sum();
    let avg_latency = latency_sum / timings.len() as u32;
    let throughput = requests as f64 / total_time.as_secs_f64();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Requests: {} ({} concurrent, k={}, {})", requests, concurrent, k, metric);
    println!("Total time: {:?}", total_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", percentile(&timings, 0.50));
    println!("P95 latency: {:?}", percentile(&timings, 0.95));
    println!("P99 latency: {:?}", percentile(&timings, 0.99));
    println!("Throughput: {:.2} requests/second", throughput);

    Ok(())
}

/// Nearest-rank percentile of an ascending, non-empty slice
fn percentile(sorted: &[Duration], p: f64) -> Duration {
    let idx = ((sorted.len() as f64 * p) as usize).min(sorted.len() - 1);
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile() {
        let timings: Vec<Duration> = (1..=100).map(Duration::from_millis).collect();
        assert_eq!(percentile(&timings, 0.50), Duration::from_millis(51));
        assert_eq!(percentile(&timings, 0.99), Duration::from_millis(100));
        assert_eq!(percentile(&timings[..1], 0.95), Duration::from_millis(1));
    }

    #[test]
    fn test_parse_recommend_args() {
        let cli = Cli::try_parse_from([
            "cf-recs", "recommend", "--user-id", "7", "-k", "15", "--metric", "cosine",
        ])
        .unwrap();

        match cli.command {
            Commands::Recommend { user_id, k, metric, limit, explain } => {
                assert_eq!(user_id, 7);
                assert_eq!(k, 15);
                assert_eq!(metric, SimilarityMetric::Cosine);
                assert_eq!(limit, 5);
                assert!(!explain);
            }
            _ => panic!("expected recommend"),
        }
        assert_eq!(cli.data_dir, PathBuf::from("data/ml-1m"));
    }

    #[test]
    fn test_parse_menu_number_metric() {
        let cli = Cli::try_parse_from(["cf-recs", "--json", "neighbors", "--user-id", "3", "--metric", "2"]).unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Neighbors { metric: SimilarityMetric::Cosine, .. }
        ));
    }

    #[test]
    fn test_rejects_unknown_metric() {
        assert!(Cli::try_parse_from(["cf-recs", "neighbors", "--user-id", "3", "--metric", "jaccard"]).is_err());
    }
}
