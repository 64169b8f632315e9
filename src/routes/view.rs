//! Chart pages.
//!
//! `GET /` and `GET /{period}` serve a page that pulls its data from
//! `/json?period=<name>`. Only known period names reach the markup; anything
//! else renders the day view.

use axum::{extract::Path, response::Html, routing::get, Router};

use crate::query::Period;

// ---

const PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Plant monitor - {period}</title>
</head>
<body data-period="{period}">
  <nav>
    <a href="/day">day</a> | <a href="/week">week</a> |
    <a href="/month">month</a> | <a href="/year">year</a>
  </nav>
  <h1>Last {period}</h1>
  <canvas id="temperature"></canvas>
  <canvas id="moisture"></canvas>
  <canvas id="light"></canvas>
  <canvas id="conductivity"></canvas>
  <script>
    fetch("/json?period={period}")
      .then((r) => r.json())
      .then((series) => {
        window.plantSeries = series;
        document.dispatchEvent(new CustomEvent("series", { detail: series }));
      });
  </script>
</body>
</html>
"#;

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    // ---
    Router::new()
        .route("/", get(home))
        .route("/{period}", get(period_view))
}

async fn home() -> Html<String> {
    render(Period::Day)
}

async fn period_view(Path(period): Path<String>) -> Html<String> {
    render(Period::parse(Some(&period)))
}

fn render(period: Period) -> Html<String> {
    Html(PAGE.replace("{period}", period.name()))
}
