use super::ParseError;
use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone, Utc, Weekday,
};
use regex::Regex;

const UNITS: &[(&str, Unit)] = &[
    ("s", Unit::Second),
    ("sec", Unit::Second),
    ("secs", Unit::Second),
    ("second", Unit::Second),
    ("seconds", Unit::Second),
    ("m", Unit::Minute),
    ("min", Unit::Minute),
    ("mins", Unit::Minute),
    ("minute", Unit::Minute),
    ("minutes", Unit::Minute),
    ("h", Unit::Hour),
    ("hr", Unit::Hour),
    ("hrs", Unit::Hour),
    ("hour", Unit::Hour),
    ("hours", Unit::Hour),
    ("d", Unit::Day),
    ("day", Unit::Day),
    ("days", Unit::Day),
    ("w", Unit::Week),
    ("wk", Unit::Week),
    ("wks", Unit::Week),
    ("week", Unit::Week),
    ("weeks", Unit::Week),
    ("mo", Unit::Month),
    ("month", Unit::Month),
    ("months", Unit::Month),
    ("y", Unit::Year),
    ("yr", Unit::Year),
    ("yrs", Unit::Year),
    ("year", Unit::Year),
    ("years", Unit::Year),
];

const DAYS: &[(&str, DayWord)] = &[
    ("today", DayWord::Today),
    ("tonight", DayWord::Tonight),
    ("tomorrow", DayWord::Tomorrow),
    ("yesterday", DayWord::Yesterday),
    ("monday", DayWord::Weekday(Weekday::Mon)),
    ("mon", DayWord::Weekday(Weekday::Mon)),
    ("tuesday", DayWord::Weekday(Weekday::Tue)),
    ("tue", DayWord::Weekday(Weekday::Tue)),
    ("tues", DayWord::Weekday(Weekday::Tue)),
    ("wednesday", DayWord::Weekday(Weekday::Wed)),
    ("wed", DayWord::Weekday(Weekday::Wed)),
    ("thursday", DayWord::Weekday(Weekday::Thu)),
    ("thu", DayWord::Weekday(Weekday::Thu)),
    ("thur", DayWord::Weekday(Weekday::Thu)),
    ("thurs", DayWord::Weekday(Weekday::Thu)),
    ("friday", DayWord::Weekday(Weekday::Fri)),
    ("fri", DayWord::Weekday(Weekday::Fri)),
    ("saturday", DayWord::Weekday(Weekday::Sat)),
    ("sat", DayWord::Weekday(Weekday::Sat)),
    ("sunday", DayWord::Weekday(Weekday::Sun)),
    ("sun", DayWord::Weekday(Weekday::Sun)),
];

const MONTHS: &[(&str, u32)] = &[
    ("january", 1),
    ("jan", 1),
    ("february", 2),
    ("feb", 2),
    ("march", 3),
    ("mar", 3),
    ("april", 4),
    ("apr", 4),
    ("may", 5),
    ("june", 6),
    ("jun", 6),
    ("july", 7),
    ("jul", 7),
    ("august", 8),
    ("aug", 8),
    ("september", 9),
    ("sep", 9),
    ("sept", 9),
    ("october", 10),
    ("oct", 10),
    ("november", 11),
    ("nov", 11),
    ("december", 12),
    ("dec", 12),
];

const CLOCK_WORDS: &[(&str, (u32, u32))] = &[("noon", (12, 0)), ("midday", (12, 0)), ("midnight", (0, 0))];

/// Used for "tonight" when no time is given.
const TONIGHT: (u32, u32) = (20, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Unit {
    fn add(self, at: DateTime<FixedOffset>, amount: i64) -> Option<DateTime<FixedOffset>> {
        let delta = match self {
            Unit::Second => Duration::try_seconds(amount)?,
            Unit::Minute => Duration::try_minutes(amount)?,
            Unit::Hour => Duration::try_hours(amount)?,
            Unit::Day => Duration::try_days(amount)?,
            Unit::Week => Duration::try_weeks(amount)?,
            Unit::Month => return at.checked_add_months(Months::new(u32::try_from(amount).ok()?)),
            Unit::Year => {
                let months = u32::try_from(amount.checked_mul(12)?).ok()?;
                return at.checked_add_months(Months::new(months));
            }
        };
        at.checked_add_signed(delta)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayWord {
    Today,
    Tonight,
    Tomorrow,
    DayAfterTomorrow,
    Yesterday,
    Weekday(Weekday),
}

/// Phrase tables the parser matches words against. Extend any table to teach
/// it new aliases.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    pub units: Vec<(String, Unit)>,
    pub days: Vec<(String, DayWord)>,
    pub months: Vec<(String, u32)>,
    pub clock_words: Vec<(String, NaiveTime)>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        fn owned<T: Copy>(table: &[(&str, T)]) -> Vec<(String, T)> {
            table.iter().map(|(word, v)| (word.to_string(), *v)).collect()
        }
        Vocabulary {
            units: owned(UNITS),
            days: owned(DAYS),
            months: owned(MONTHS),
            clock_words: CLOCK_WORDS
                .iter()
                .filter_map(|(word, (h, m))| Some((word.to_string(), NaiveTime::from_hms_opt(*h, *m, 0)?)))
                .collect(),
        }
    }
}

impl Vocabulary {
    fn terms(&self) -> impl Iterator<Item = &str> {
        self.units
            .iter()
            .map(|(w, _)| w.as_str())
            .chain(self.days.iter().map(|(w, _)| w.as_str()))
            .chain(self.months.iter().map(|(w, _)| w.as_str()))
            .chain(self.clock_words.iter().map(|(w, _)| w.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Minimum Jaro-Winkler score for a misspelled keyword to count.
    pub similarity_threshold: f64,
    /// Minimum score for a word to be offered back as "did you mean".
    pub suggestion_floor: f64,
    /// Shorter words only match exactly, so "m" never turns into "mo".
    pub min_fuzzy_len: usize,
    /// Time of day for phrases that name a day but no time.
    pub default_time: NaiveTime,
    pub max_horizon: Duration,
    pub vocabulary: Vocabulary,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            similarity_threshold: 0.85,
            suggestion_floor: 0.7,
            min_fuzzy_len: 4,
            default_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            max_horizon: Duration::days(400),
            vocabulary: Vocabulary::default(),
        }
    }
}

/// Ways of reading a time phrase, tried in this order.
#[derive(Debug, Clone, Copy)]
enum Strategy {
    AbsoluteDate,
    RelativeOffset,
    NamedDay,
}

impl Strategy {
    const ALL: [Strategy; 3] = [Strategy::AbsoluteDate, Strategy::RelativeOffset, Strategy::NamedDay];

    fn resolve(
        self, parser: &TimeParser, words: &[&str], reference: DateTime<FixedOffset>,
    ) -> Result<Option<DateTime<FixedOffset>>, ParseError> {
        match self {
            Strategy::AbsoluteDate => Ok(parser.absolute_date(words, reference)),
            Strategy::RelativeOffset => parser.relative_offset(words, reference),
            Strategy::NamedDay => Ok(parser.named_day(words, reference)),
        }
    }
}

struct DateSpec {
    date: NaiveDate,
    year_given: bool,
}

struct Patterns {
    /// digit runs and letter runs, so "1h30m" splits into 1 h 30 m
    run: Regex,
    clock: Regex,
    dmy: Regex,
    ymd: Regex,
    year: Regex,
    utc_offset: Regex,
}

pub struct TimeParser {
    config: ParserConfig,
    patterns: Patterns,
}

impl TimeParser {
    pub fn new(config: ParserConfig) -> Result<Self, regex::Error> {
        let patterns = Patterns {
            run: Regex::new(r"\d+|[a-z]+")?,
            clock: Regex::new(r"^(\d{1,2})(?::(\d{2}))?(am|pm)?$")?,
            dmy: Regex::new(r"^(\d{1,2})[-/.](\d{1,2})[-/.](\d{4})$")?,
            ymd: Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$")?,
            year: Regex::new(r"^\d{4}$")?,
            utc_offset: Regex::new(r"^(?:utc|gmt)?\s*(?:([+-])\s*(\d{1,2})(?::?(\d{2}))?)?$")?,
        };
        Ok(TimeParser { config, patterns })
    }

    /// Turns `text` into an instant strictly after `reference`. Wall-clock
    /// phrases are read in the reference's UTC offset.
    pub fn parse(
        &self, text: &str, reference: DateTime<FixedOffset>,
    ) -> Result<DateTime<Utc>, ParseError> {
        let lowered = text.to_lowercase().replace(',', " ");
        let words: Vec<&str> = lowered
            .split_whitespace()
            .map(|w| w.trim_matches(|c| c == '.' || c == '!'))
            .filter(|w| !w.is_empty())
            .collect();

        if !words.is_empty() {
            for strategy in Strategy::ALL {
                if let Some(at) = strategy.resolve(self, &words, reference)? {
                    tracing::debug!(?strategy, input = text, %at, "resolved time phrase");
                    return self.validate(at, reference);
                }
            }
        }
        Err(ParseError::Unparseable { input: text.trim().to_string(), suggestion: self.suggest(&words) })
    }

    /// Accepts `+02:00`, `-5`, `UTC+0530`, `gmt-3:30`, plain `utc`.
    pub fn utc_offset(&self, text: &str) -> Result<FixedOffset, ParseError> {
        let invalid = || ParseError::InvalidOffset(text.trim().to_string());
        let lowered = text.trim().to_lowercase();
        let captures = self.patterns.utc_offset.captures(&lowered).ok_or_else(invalid)?;
        let Some(sign) = captures.get(1) else {
            if lowered.is_empty() {
                return Err(invalid());
            }
            return FixedOffset::east_opt(0).ok_or_else(invalid);
        };
        let hours: i32 = captures[2].parse().map_err(|_| invalid())?;
        let minutes: i32 = match captures.get(3) {
            Some(m) => m.as_str().parse().map_err(|_| invalid())?,
            None => 0,
        };
        if hours > 14 || minutes >= 60 {
            return Err(invalid());
        }
        let seconds = (hours * 60 + minutes) * 60;
        let seconds = if sign.as_str() == "-" { -seconds } else { seconds };
        FixedOffset::east_opt(seconds).ok_or_else(invalid)
    }

    fn validate(
        &self, at: DateTime<FixedOffset>, reference: DateTime<FixedOffset>,
    ) -> Result<DateTime<Utc>, ParseError> {
        let at = at.with_timezone(&Utc);
        let reference = reference.with_timezone(&Utc);
        if at <= reference {
            return Err(ParseError::PastOrPresent { at });
        }
        if at - reference > self.config.max_horizon {
            return Err(self.too_far());
        }
        Ok(at)
    }

    fn too_far(&self) -> ParseError {
        ParseError::TooFar { max_days: self.config.max_horizon.num_days() }
    }

    fn lookup<T: Copy>(&self, word: &str, table: &[(String, T)]) -> Option<T> {
        if let Some((_, value)) = table.iter().find(|(w, _)| w == word) {
            return Some(*value);
        }
        let min_len = self.config.min_fuzzy_len;
        if word.chars().count() < min_len {
            return None;
        }
        table
            .iter()
            .filter(|(w, _)| w.chars().count() >= min_len)
            .map(|(w, value)| (strsim::jaro_winkler(word, w), *value))
            .filter(|(score, _)| *score >= self.config.similarity_threshold)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, value)| value)
    }

    fn suggest(&self, words: &[&str]) -> Option<String> {
        words
            .iter()
            .filter(|w| w.chars().count() >= 3)
            .flat_map(|w| {
                self.config
                    .vocabulary
                    .terms()
                    .filter(move |term| term != w && term.chars().count() >= self.config.min_fuzzy_len)
                    .map(move |term| (strsim::jaro_winkler(w, term), term))
            })
            .filter(|(score, _)| *score >= self.config.suggestion_floor)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, term)| term.to_string())
    }

    fn clock_time(&self, words: &[&str]) -> Option<NaiveTime> {
        if let [word] = words {
            if let Some(time) = self.lookup(word, &self.config.vocabulary.clock_words) {
                return Some(time);
            }
        }
        let joined = words.concat();
        let captures = self.patterns.clock.captures(&joined)?;
        let hour: u32 = captures[1].parse().ok()?;
        let minute: u32 = match captures.get(2) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        let hour = match captures.get(3).map(|m| m.as_str()) {
            Some(meridiem) => {
                if !(1..=12).contains(&hour) {
                    return None;
                }
                hour % 12 + if meridiem == "pm" { 12 } else { 0 }
            }
            // a bare "5" is too ambiguous to be a time
            None if captures.get(2).is_none() => return None,
            None => hour,
        };
        NaiveTime::from_hms_opt(hour, minute, 0)
    }

    fn day_number(word: &str) -> Option<u32> {
        let digits = ["st", "nd", "rd", "th"].iter().find_map(|s| word.strip_suffix(s)).unwrap_or(word);
        digits.parse().ok().filter(|d| (1..=31).contains(d))
    }

    /// Reads a date off the front of `words`, returning how many words it took.
    fn date_at(&self, words: &[&str], today: NaiveDate) -> Option<(DateSpec, usize)> {
        let year_after = |i: usize| {
            words
                .get(i)
                .filter(|w| self.patterns.year.is_match(w))
                .and_then(|w| w.parse::<i32>().ok())
        };
        let months = &self.config.vocabulary.months;
        let named = match words {
            [first, second, ..] => match (self.lookup(first, months), Self::day_number(second)) {
                (Some(month), Some(day)) => Some((month, day)),
                _ => match (Self::day_number(first), self.lookup(second, months)) {
                    (Some(day), Some(month)) => Some((month, day)),
                    _ => None,
                },
            },
            _ => None,
        };
        if let Some((month, day)) = named {
            return match year_after(2) {
                Some(year) => {
                    Some((DateSpec { date: NaiveDate::from_ymd_opt(year, month, day)?, year_given: true }, 3))
                }
                None => Some((
                    DateSpec { date: NaiveDate::from_ymd_opt(today.year(), month, day)?, year_given: false },
                    2,
                )),
            };
        }

        let first = words.first()?;
        let (year, month, day) = if let Some(c) = self.patterns.dmy.captures(first) {
            (c[3].parse().ok()?, c[2].parse().ok()?, c[1].parse().ok()?)
        } else if let Some(c) = self.patterns.ymd.captures(first) {
            (c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?)
        } else {
            return None;
        };
        Some((DateSpec { date: NaiveDate::from_ymd_opt(year, month, day)?, year_given: true }, 1))
    }

    /// Finds a date at the start or the end of `words` and returns it with
    /// whatever is left over.
    fn split_date<'w>(&self, words: &[&'w str], today: NaiveDate) -> Option<(DateSpec, Vec<&'w str>)> {
        if let Some((date, used)) = self.date_at(words, today) {
            return Some((date, words[used..].to_vec()));
        }
        (1..words.len()).find_map(|start| {
            let (date, used) = self.date_at(&words[start..], today)?;
            (start + used == words.len()).then(|| (date, words[..start].to_vec()))
        })
    }

    fn local(reference: DateTime<FixedOffset>, naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        reference.offset().from_local_datetime(&naive).single()
    }

    fn absolute_date(
        &self, words: &[&str], reference: DateTime<FixedOffset>,
    ) -> Option<DateTime<FixedOffset>> {
        let words: Vec<&str> = words.iter().copied().filter(|w| !matches!(*w, "on" | "at")).collect();
        let now = reference.naive_local();

        let naive = match self.split_date(&words, now.date()) {
            Some((spec, rest)) => {
                let time = if rest.is_empty() { self.config.default_time } else { self.clock_time(&rest)? };
                let at = spec.date.and_time(time);
                if !spec.year_given && at <= now {
                    at.with_year(at.year() + 1)?
                } else {
                    at
                }
            }
            None => {
                let at = now.date().and_time(self.clock_time(&words)?);
                // a time that already passed today means tomorrow
                if at <= now {
                    at + Duration::days(1)
                } else {
                    at
                }
            }
        };
        Self::local(reference, naive)
    }

    fn relative_offset(
        &self, words: &[&str], reference: DateTime<FixedOffset>,
    ) -> Result<Option<DateTime<FixedOffset>>, ParseError> {
        let mut words = words;
        if let Some(rest) = words.strip_prefix(&["in"]) {
            words = rest;
        }
        if let Some(rest) = words.strip_suffix(&["from", "now"]).or_else(|| words.strip_suffix(&["later"])) {
            words = rest;
        }

        let mut runs = Vec::new();
        for word in words {
            let mut covered = 0;
            for run in self.patterns.run.find_iter(word) {
                covered += run.len();
                runs.push(run.as_str());
            }
            if covered != word.len() {
                return Ok(None);
            }
        }
        runs.retain(|run| *run != "and");
        if runs.is_empty() || runs.len() % 2 != 0 {
            return Ok(None);
        }

        let mut at = reference;
        for pair in runs.chunks(2) {
            let amount = match pair[0] {
                "a" | "an" => 1,
                n if n.bytes().all(|b| b.is_ascii_digit()) => {
                    n.parse::<u32>().map_err(|_| self.too_far())? as i64
                }
                _ => return Ok(None),
            };
            let Some(unit) = self.lookup(pair[1], &self.config.vocabulary.units) else {
                return Ok(None);
            };
            at = unit.add(at, amount).ok_or_else(|| self.too_far())?;
        }
        Ok(Some(at))
    }

    fn named_day(
        &self, words: &[&str], reference: DateTime<FixedOffset>,
    ) -> Option<DateTime<FixedOffset>> {
        let words: Vec<&str> =
            words.iter().copied().filter(|w| !matches!(*w, "on" | "at" | "this")).collect();
        let days = &self.config.vocabulary.days;
        let pos = words.iter().position(|w| self.lookup(w, days).is_some())?;
        let mut day = self.lookup(words[pos], days)?;

        let mut start = pos;
        let mut next = false;
        if pos >= 1 && words[pos - 1] == "next" {
            next = true;
            start = pos - 1;
        } else if pos >= 2 && day == DayWord::Tomorrow && words[pos - 2..pos] == ["day", "after"] {
            day = DayWord::DayAfterTomorrow;
            start = pos - 2;
        }
        if next && !matches!(day, DayWord::Weekday(_)) {
            return None;
        }

        let rest: Vec<&str> = words[..start].iter().chain(&words[pos + 1..]).copied().collect();
        let time = match (rest.is_empty(), day) {
            (true, DayWord::Tonight) => NaiveTime::from_hms_opt(TONIGHT.0, TONIGHT.1, 0)?,
            (true, _) => self.config.default_time,
            (false, _) => self.clock_time(&rest)?,
        };

        let now = reference.naive_local();
        let today = now.date();
        let date = match day {
            DayWord::Today | DayWord::Tonight => today,
            DayWord::Tomorrow => today + Duration::days(1),
            DayWord::DayAfterTomorrow => today + Duration::days(2),
            DayWord::Yesterday => today - Duration::days(1),
            DayWord::Weekday(weekday) => {
                let ahead = (7 + weekday.num_days_from_monday() - today.weekday().num_days_from_monday()) % 7;
                let date = today + Duration::days(ahead.into());
                // "friday" on a friday is today unless that time is gone, "next friday" never is
                if ahead == 0 && (next || date.and_time(time) <= now) {
                    date + Duration::days(7)
                } else {
                    date
                }
            }
        };
        Self::local(reference, date.and_time(time))
    }
}
