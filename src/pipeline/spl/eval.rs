//! Expression evaluation and per-stage group transformation.

use std::sync::{Arc, Mutex};

use serde_json::Value as JsonValue;

use super::ast::{Expr, FieldRef};
use super::compiled::CompiledStage;
use super::value::SplValue;
use crate::event::{EventGroup, LogEvent};
use crate::pipeline::ProcessProfile;

fn bump(profile: &Arc<Mutex<ProcessProfile>>, f: impl FnOnce(&mut ProcessProfile)) {
    let mut p = profile.lock().expect("process profile mutex poisoned");
    f(&mut p);
}

fn json_path_lookup<'a>(root: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let path = path.strip_prefix('$').unwrap_or(path);
    let mut current = root;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

pub fn eval_expr(
    expr: &Expr,
    event: &LogEvent,
    group: &EventGroup,
    profile: &Arc<Mutex<ProcessProfile>>,
) -> SplValue {
    match expr {
        Expr::Column(name) => event
            .get_content(name)
            .map(SplValue::Str)
            .unwrap_or(SplValue::Null),
        Expr::TagColumn(name) => group
            .tags()
            .get(name)
            .map(|v| SplValue::Str(v.resolve()))
            .unwrap_or(SplValue::Null),
        Expr::StrLit(s) => SplValue::Str(s.clone()),
        Expr::IntLit(i) => SplValue::Int(*i),
        Expr::Eq(a, b) => SplValue::Bool(
            eval_expr(a, event, group, profile).to_content_string()
                == eval_expr(b, event, group, profile).to_content_string(),
        ),
        Expr::Ne(a, b) => SplValue::Bool(
            eval_expr(a, event, group, profile).to_content_string()
                != eval_expr(b, event, group, profile).to_content_string(),
        ),
        Expr::And(a, b) => SplValue::Bool(
            eval_expr(a, event, group, profile).truthy()
                && eval_expr(b, event, group, profile).truthy(),
        ),
        Expr::Or(a, b) => SplValue::Bool(
            eval_expr(a, event, group, profile).truthy()
                || eval_expr(b, event, group, profile).truthy(),
        ),
        Expr::Not(inner) => SplValue::Bool(!eval_expr(inner, event, group, profile).truthy()),
        Expr::JsonExtract(inner, path) => {
            let base = eval_expr(inner, event, group, profile).to_content_string();
            match serde_json::from_str::<JsonValue>(&base) {
                Ok(json) => match json_path_lookup(&json, path) {
                    Some(v) => SplValue::Json(v.clone()),
                    None => {
                        bump(profile, |p| p.parse_failures += 1);
                        SplValue::Str(String::new())
                    }
                },
                Err(_) => {
                    bump(profile, |p| p.parse_failures += 1);
                    SplValue::Str(String::new())
                }
            }
        }
    }
}

fn parse_kv_pairs(text: &str, delims: &[char], out: &mut Vec<(String, String)>) {
    for pair in text.split(|c: char| delims.contains(&c)) {
        if pair.is_empty() {
            continue;
        }
        if let Some((k, v)) = pair.split_once('=') {
            out.push((k.to_string(), v.to_string()));
        }
    }
}

fn parse_csv_row(text: &str) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(text.as_bytes());
    match reader.records().next() {
        Some(Ok(record)) => record.iter().map(|s| s.to_string()).collect(),
        _ => Vec::new(),
    }
}

pub fn apply_stage(
    stage: &CompiledStage,
    group: EventGroup,
    discard_unmatch: bool,
    profile: &Arc<Mutex<ProcessProfile>>,
) -> EventGroup {
    match stage {
        CompiledStage::Where(expr) => {
            let mut out = group.fork_empty();
            let events = group.events().to_vec();
            for event in events {
                if eval_expr(expr, &event, &out, profile).truthy() {
                    out.push_event(event);
                }
            }
            out
        }
        CompiledStage::Extend(assigns) => {
            let mut group = group;
            let events = std::mem::take(group.events_mut());
            let mut new_events = Vec::with_capacity(events.len());
            for mut event in events {
                for (name, expr) in assigns {
                    let value = eval_expr(expr, &event, &group, profile).to_content_string();
                    let view = group.intern(&value);
                    event.set_content(name.clone(), view);
                }
                new_events.push(event);
            }
            *group.events_mut() = new_events;
            group
        }
        CompiledStage::ParseJson(field) => {
            let mut out = group.fork_empty();
            let events = group.into_events();
            for mut event in events {
                let Some(raw) = event.get_content(field) else {
                    out.push_event(event);
                    continue;
                };
                match serde_json::from_str::<JsonValue>(&raw) {
                    Ok(JsonValue::Object(map)) => {
                        for (key, value) in map {
                            let text = SplValue::Json(value).to_content_string();
                            let view = out.intern(&text);
                            event.set_content(key, view);
                        }
                        out.push_event(event);
                    }
                    _ => {
                        bump(profile, |p| p.parse_failures += 1);
                        if !discard_unmatch {
                            out.push_event(event);
                        }
                    }
                }
            }
            out
        }
        CompiledStage::ParseRegexp {
            field,
            regex,
            targets,
        } => {
            let mut out = group.fork_empty();
            let events = group.into_events();
            for mut event in events {
                let Some(raw) = event.get_content(field) else {
                    out.push_event(event);
                    continue;
                };
                match regex.captures(&raw) {
                    Some(caps) => {
                        for (i, name) in targets.iter().enumerate() {
                            if let Some(m) = caps.get(i + 1) {
                                let view = out.intern(m.as_str());
                                event.set_content(name.clone(), view);
                            }
                        }
                        out.push_event(event);
                    }
                    None => {
                        bump(profile, |p| p.regex_match_failures += 1);
                        if !discard_unmatch {
                            out.push_event(event);
                        }
                    }
                }
            }
            out
        }
        CompiledStage::ParseCsv { field, targets } => {
            let mut out = group.fork_empty();
            let events = group.into_events();
            for mut event in events {
                let Some(raw) = event.get_content(field) else {
                    out.push_event(event);
                    continue;
                };
                let fields = parse_csv_row(&raw);
                if fields.is_empty() && !raw.is_empty() {
                    bump(profile, |p| p.parse_failures += 1);
                    if !discard_unmatch {
                        out.push_event(event);
                    }
                    continue;
                }
                for (name, value) in targets.iter().zip(fields.iter()) {
                    let view = out.intern(value);
                    event.set_content(name.clone(), view);
                }
                out.push_event(event);
            }
            out
        }
        CompiledStage::ParseKv { delims, field } => {
            let mut out = group.fork_empty();
            let events = group.into_events();
            for mut event in events {
                let Some(raw) = event.get_content(field) else {
                    out.push_event(event);
                    continue;
                };
                let mut pairs = Vec::new();
                parse_kv_pairs(&raw, delims, &mut pairs);
                for (key, value) in pairs {
                    let view = out.intern(&value);
                    event.set_content(key, view);
                }
                out.push_event(event);
            }
            out
        }
        CompiledStage::ProjectRename(renames) => {
            let mut group = group;
            for (target, source) in renames {
                let value = match source {
                    FieldRef::Content(name) => {
                        let mut found = None;
                        for event in group.events_mut() {
                            if let Some(v) = event.content_mut().remove(name) {
                                found = Some(v);
                            }
                        }
                        found
                    }
                    FieldRef::Tag(name) => group.remove_tag(name),
                };
                if let Some(view) = value {
                    match target {
                        FieldRef::Content(name) => {
                            for event in group.events_mut() {
                                event.set_content(name.clone(), view.clone());
                            }
                        }
                        FieldRef::Tag(name) => {
                            group.set_tag(name.clone(), view);
                        }
                    }
                }
            }
            group
        }
    }
}
