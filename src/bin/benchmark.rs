use chrono::{Duration as ChronoDuration, Utc};
use colored::*;
use governor::{Quota, RateLimiter};
use hdrhistogram::Histogram;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::env;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

const DURATION_SECS: u64 = 10;
const CAPACITY: i64 = 50;
const STUDENTS: usize = 400;
const RACE_RPS: u32 = 400;

#[derive(Default)]
struct RaceTally {
    accepted: u32,
    full: u32,
    other: u32,
}

#[tokio::main]
async fn main() {
    let base_url = env::var("BENCH_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let admin_user = env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
    let Ok(admin_password) = env::var("ADMIN_PASSWORD") else {
        eprintln!("{}", "ADMIN_PASSWORD must be set to the server's bootstrap admin password.".red().bold());
        return;
    };

    println!("{}", "Starting Campus Events Benchmark".bold().green());
    println!("Target URL: {}", base_url);

    let admin = new_client();
    if admin.get(format!("{}/health", base_url)).send().await.is_err() {
        eprintln!("{}", format!("Server is NOT reachable at {}. Please start it first.", base_url).red().bold());
        return;
    }

    println!("\n{}", "Setting up benchmark data...".yellow());
    let admin_csrf = login(&admin, &base_url, &admin_user, &admin_password).await;
    let event_id = setup_event(&admin, &base_url, &admin_csrf).await;
    println!("   Event ID: {} (capacity {})", event_id, CAPACITY);

    let students = signup_students(&base_url, STUDENTS).await;
    println!("{}", format!("Created {} students.", students.len()).green());

    println!("\n{}", "=".repeat(60));
    println!("Public catalog read: {}", "GET /api/v1/events".cyan().bold());
    println!("{}", "=".repeat(60));
    println!("{:<10} | {:<15} | {:<15} | {:<15}", "RPS", "Mean (ms)", "P99 (ms)", "Success Rate");
    println!("{:-<10}-+-{:-<15}-+-{:-<15}-+-{:-<15}", "", "", "", "");
    for rps in [10, 50, 200, 1000] {
        run_read_stage(&admin, &format!("{}/api/v1/events", base_url), rps).await;
    }

    println!("\n{}", "=".repeat(60));
    println!("Registration race: {} students for {} seats", students.len(), CAPACITY);
    println!("{}", "=".repeat(60));
    let tally = run_registration_race(&base_url, &event_id, students).await;

    let detail: Value = admin.get(format!("{}/api/v1/events/{}", base_url, event_id))
        .send().await.expect("Failed to fetch event")
        .json().await.expect("Failed to parse event");
    let active = detail["active_count"].as_i64().unwrap_or(-1);

    println!("accepted: {}  full: {}  other: {}", tally.accepted, tally.full, tally.other);
    if active <= CAPACITY && i64::from(tally.accepted) == active {
        println!("{}", format!("Capacity held: {} active of {}", active, CAPACITY).green().bold());
    } else {
        println!("{}", format!("Capacity VIOLATED: {} active of {}, {} accepted", active, CAPACITY, tally.accepted).red().bold());
    }
}

fn new_client() -> Client {
    Client::builder()
        .pool_max_idle_per_host(1000)
        .timeout(Duration::from_secs(10))
        .cookie_store(true)
        .build()
        .expect("Failed to build HTTP client")
}

async fn login(client: &Client, base_url: &str, username: &str, password: &str) -> String {
    let res = client.post(format!("{}/api/v1/auth/login", base_url))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Login failed during setup");

    if !res.status().is_success() {
        panic!("Login failed. Status: {}", res.status());
    }

    let body: Value = res.json().await.expect("Failed to parse login response");
    body["csrf_token"].as_str().expect("No csrf_token").to_string()
}

async fn setup_event(client: &Client, base_url: &str, csrf_token: &str) -> String {
    let starts_at = Utc::now() + ChronoDuration::days(7);
    let res = client.post(format!("{}/api/v1/events", base_url))
        .header("X-CSRF-Token", csrf_token)
        .json(&json!({
            "title": format!("Benchmark Night {}", Uuid::new_v4()),
            "description": "Load testing the registration ledger",
            "category": "Tech",
            "location": "Server Room",
            "starts_at": starts_at.to_rfc3339(),
            "ends_at": (starts_at + ChronoDuration::hours(2)).to_rfc3339(),
            "capacity": CAPACITY
        }))
        .send()
        .await
        .expect("Failed to create event");

    if !res.status().is_success() {
        let status = res.status();
        let txt = res.text().await.unwrap_or_default();
        panic!("Failed to create event. Status: {}. Body: {}", status, txt);
    }

    let body: Value = res.json().await.expect("Failed to parse event response");
    body["id"].as_str().expect("No event id").to_string()
}

/// Each student gets its own cookie jar.
async fn signup_students(base_url: &str, count: usize) -> Vec<(Client, String)> {
    let run = Uuid::new_v4().simple().to_string();
    let mut students = Vec::with_capacity(count);

    for i in 0..count {
        let client = new_client();
        let username = format!("bench-{}-{}", &run[..8], i);
        let res = client.post(format!("{}/api/v1/auth/signup", base_url))
            .json(&json!({
                "username": username,
                "password": "benchmark-password",
                "full_name": format!("Bench Student {}", i),
                "email": format!("{}@bench.local", username)
            }))
            .send()
            .await
            .expect("Signup failed during setup");

        if !res.status().is_success() {
            panic!("Signup failed. Status: {}", res.status());
        }

        let body: Value = res.json().await.expect("Failed to parse signup response");
        let csrf = body["csrf_token"].as_str().expect("No csrf_token").to_string();
        students.push((client, csrf));
    }

    students
}

async fn run_registration_race(base_url: &str, event_id: &str, students: Vec<(Client, String)>) -> RaceTally {
    let limiter = RateLimiter::direct(Quota::per_second(NonZeroU32::new(RACE_RPS).expect("non-zero rps")));
    let (tx, mut rx) = mpsc::channel(students.len().max(1));
    let url = format!("{}/api/v1/events/{}/registrations", base_url, event_id);

    for (client, csrf) in students {
        limiter.until_ready().await;
        let url = url.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let req_start = Instant::now();
            let res = client.post(&url).header("X-CSRF-Token", csrf).send().await;
            let latency = req_start.elapsed();

            let outcome = match res {
                Ok(r) if r.status() == StatusCode::CREATED => Some(true),
                Ok(r) if r.status() == StatusCode::CONFLICT => {
                    let body: Value = r.json().await.unwrap_or_default();
                    (body["code"] == "CAPACITY_EXCEEDED").then_some(false)
                }
                _ => None,
            };
            let _ = tx.send((latency, outcome)).await;
        });
    }
    drop(tx);

    let mut histogram = Histogram::<u64>::new(3).expect("histogram");
    let mut tally = RaceTally::default();
    while let Some((latency, outcome)) = rx.recv().await {
        let _ = histogram.record(latency.as_micros() as u64);
        match outcome {
            Some(true) => tally.accepted += 1,
            Some(false) => tally.full += 1,
            None => tally.other += 1,
        }
    }

    println!(
        "register latency: mean {:.2} ms, p99 {:.2} ms",
        histogram.mean() / 1000.0,
        histogram.value_at_quantile(0.99) as f64 / 1000.0
    );
    tally
}

async fn run_read_stage(client: &Client, url: &str, rps: u32) {
    let limiter = Arc::new(RateLimiter::direct(
        Quota::per_second(NonZeroU32::new(rps).expect("non-zero rps"))
    ));

    let (tx, mut rx) = mpsc::channel(50000);
    let start_time = Instant::now();
    let duration = Duration::from_secs(DURATION_SECS);

    while start_time.elapsed() <= duration {
        if limiter.check().is_ok() {
            let client = client.clone();
            let url = url.to_string();
            let tx = tx.clone();

            tokio::spawn(async move {
                let req_start = Instant::now();
                let success = client.get(&url).send().await
                    .map(|r| r.status().is_success())
                    .unwrap_or(false);
                let _ = tx.send((req_start.elapsed(), success)).await;
            });
        } else {
            tokio::task::yield_now().await;
        }
    }

    drop(tx);

    let mut histogram = Histogram::<u64>::new(3).expect("histogram");
    let mut successes = 0;
    let mut total = 0;

    while let Some((latency, success)) = rx.recv().await {
        total += 1;
        if success { successes += 1; }
        let _ = histogram.record(latency.as_micros() as u64);
    }

    let mean_ms = histogram.mean() / 1000.0;
    let p99_ms = histogram.value_at_quantile(0.99) as f64 / 1000.0;
    let success_rate = if total > 0 { (successes as f64 / total as f64) * 100.0 } else { 0.0 };

    println!(
        "{:<10} | {:<15.2} | {:<15.2} | {:<14.1}%",
        rps,
        mean_ms,
        p99_ms,
        success_rate
    );

    tokio::time::sleep(Duration::from_millis(500)).await;
}
