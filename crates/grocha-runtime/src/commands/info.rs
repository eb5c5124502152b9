use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

use grocha_channels::IncomingMessage;
use grocha_core::{Result, text};
use grocha_services::TempKind;

use super::MESSAGE_LIMIT;
use crate::session::GuildSession;

static CITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"à ([\w-]+(,\s*[\w-]+)?)").expect("static regex"));

const MANIFESTO: &str = "Un spectre hante l'Europe : le spectre du communisme. Toutes les puissances de la vieille Europe se sont unies en une Sainte-Alliance pour traquer ce spectre : le pape et le tsar, Metternich et Guizot, les radicaux de France et les policiers d'Allemagne.

Quelle est l'opposition qui n'a pas été accusée de communisme par ses adversaires au pouvoir ? Quelle est l'opposition qui, à son tour, n'a pas renvoyé à ses adversaires de droite ou de gauche l'épithète infamante de communiste ?

Il en résulte un double enseignement.

Déjà le communisme est reconnu comme une puissance par toutes les puissances d'Europe.

Il est grand temps que les communistes exposent à la face du monde entier, leurs conceptions, leurs buts et leurs tendances; qu'ils opposent au conte du spectre communiste un manifeste du Parti lui-même.

C'est à cette fin que des communistes de diverses nationalités se sont réunis à Londres et ont rédigé le Manifeste suivant, qui est publié en anglais, français, allemand, italien, flamand et danois.";

/// Time left until Friday 18:00 of the current week, wall-clock arithmetic
/// in the zone of `now`. Zero or negative once the weekend started.
pub fn weekend_wait<Z: TimeZone>(now: &DateTime<Z>) -> Duration {
    let days = 4 - i64::from(now.weekday().num_days_from_monday());
    let hours = 18 - i64::from(now.hour());
    Duration::days(days) + Duration::hours(hours)
        - Duration::minutes(i64::from(now.minute()))
        - Duration::seconds(i64::from(now.second()))
}

/// `2 jours, 3:04:05`, the day part omitted under one day.
pub fn format_wait(wait: Duration) -> String {
    let total = wait.num_seconds().max(0);
    let (days, rest) = (total / 86_400, total % 86_400);
    let clock = format!("{}:{:02}:{:02}", rest / 3600, rest % 3600 / 60, rest % 60);
    match days {
        0 => clock,
        1 => format!("1 jour, {clock}"),
        n => format!("{n} jours, {clock}"),
    }
}

/// City named after `à` in the raw message, optionally with a region.
pub fn parse_city(content: &str) -> Option<String> {
    CITY.captures(content).map(|c| c[1].to_string())
}

impl GuildSession {
    pub(crate) async fn cmd_weekend(&mut self, msg: &IncomingMessage) -> Result<()> {
        let zone = self.ctx.config.read().services.timezone.clone();
        let tz: Tz = zone.parse().unwrap_or_else(|_| {
            warn!(timezone = %zone, "unknown timezone, using Europe/Paris");
            chrono_tz::Europe::Paris
        });
        let wait = weekend_wait(&Utc::now().with_timezone(&tz));

        let text = if wait <= Duration::zero() {
            format!("MAOU! {} (c'est le weekend!)", self.directory.grant_markup())
        } else if wait <= Duration::hours(1) {
            format!("MAOU... :eyes: (plus que {} avant le weekend...)", format_wait(wait))
        } else {
            format!(
                "MAOU... :disappointed: (encore {} avant le weekend...)",
                format_wait(wait)
            )
        };
        self.reply(msg.message, &text).await?;
        Ok(())
    }

    pub(crate) async fn cmd_meteo(&mut self, msg: &IncomingMessage) -> Result<()> {
        let services = self.ctx.config.read().services.clone();
        let weather = self.ctx.weather.clone();

        let (lat, lon, place) = match parse_city(&msg.content) {
            Some(city) => match weather.geocode(&city).await? {
                Some(found) => (found.lat, found.lon, found.name),
                None => {
                    let text = format!(":disappointed: Je ne connais pas de ville nommée {city}");
                    self.reply(msg.message, &text).await?;
                    return Ok(());
                }
            },
            None => (services.default_lat, services.default_lon, services.default_city),
        };

        let kind = if msg.content.contains("ressenti") {
            TempKind::FeelsLike
        } else if msg.content.contains("exact") {
            TempKind::Exact
        } else {
            TempKind::default()
        };
        debug!(guild = self.guild, %place, ?kind, "weather requested");

        let forecast = weather.forecast(lat, lon).await?;
        let report = text::truncate_chars(&forecast.report(&place, kind), MESSAGE_LIMIT);
        self.reply(msg.message, &report).await?;
        Ok(())
    }

    pub(crate) async fn cmd_revolution(&mut self, msg: &IncomingMessage) -> Result<()> {
        let emoji_name = self.ctx.config.read().guild.revolution_emoji.clone();
        let text = format!(
            "MAOU! {}\n```\n{MANIFESTO}\n```",
            self.directory.emoji_markup(&emoji_name)
        );
        self.reply(msg.message, &text).await?;
        Ok(())
    }

    pub(crate) async fn cmd_version(&mut self, msg: &IncomingMessage) -> Result<()> {
        let version = self.ctx.ops.version().await?;
        let text = format!(
            "MAOU :date:\nSha1: `{}`\nDate: `{}`",
            version.sha, version.date
        );
        self.reply(msg.message, &text).await?;
        Ok(())
    }

    pub(crate) async fn cmd_profile(&mut self, msg: &IncomingMessage) -> Result<()> {
        let report = self.profiler.report();
        self.reply(msg.message, &report).await?;
        Ok(())
    }
}
