use std::rc::Rc;

use quark_core::{Runtime, RuntimeConfig, WatchOptions};
use quark_element::*;

struct Counter;

impl Lifecycle for Counter {
    fn mounted(&self, host: &Host) {
        log::info!("<{}> mounted", host.tag());
    }

    fn updated(&self, _host: &Host, name: &str, old: &Value, new: &Value) {
        println!("  updated {name}: {old} -> {new}");
    }
}

impl Component for Counter {
    type Output = String;

    fn render(&self, host: &Host) -> anyhow::Result<Option<String>> {
        let label = host.get("label")?;
        let count = host.get("count")?;
        let clicks = host.get("clicks")?;
        let total = host.get("total")?;
        let disabled = if host.get("disabled")?.is_truthy() { " disabled" } else { "" };
        Ok(Some(format!(
            "<button{disabled}>{label}: {count} + {clicks} clicks = {total}</button>"
        )))
    }
}

struct Announcer;

impl Controller for Announcer {
    fn host_connected(&self, host: &Host) {
        println!("  [controller] <{}> connected", host.tag());
    }

    fn host_disconnected(&self, host: &Host) {
        println!("  [controller] <{}> disconnected", host.tag());
    }
}

fn counter_def() -> ComponentDef {
    ComponentDef::new("x-counter")
        .prop(PropertyDeclaration::new("label").default("Count"))
        .prop(
            PropertyDeclaration::new("count")
                .ty(PropType::Number)
                .default(0),
        )
        .prop(PropertyDeclaration::new("disabled").ty(PropType::Boolean))
        .state("clicks", 0)
        .computed("total", |host| {
            let count = host.get("count")?.as_f64().unwrap_or_default();
            let clicks = host.get("clicks")?.as_f64().unwrap_or_default();
            Ok(Value::Number(count + clicks))
        })
        .watch(
            "total",
            WatchOptions::default().immediate(true),
            |_host, new, old| {
                match old {
                    Some(old) => println!("  [watch] total {old} -> {new}"),
                    None => println!("  [watch] total starts at {new}"),
                }
                Ok(())
            },
        )
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut registry = Registry::new();
    registry.define(counter_def());
    let def = registry
        .get("x-counter")
        .ok_or_else(|| anyhow::anyhow!("x-counter is not defined"))?;

    let rt = Runtime::with_config(RuntimeConfig {
        trace_evaluations: true,
        ..RuntimeConfig::default()
    });
    let renderer = |tree: Option<String>| -> anyhow::Result<()> {
        match tree {
            Some(tree) => println!("{tree}"),
            None => println!("(cleared)"),
        }
        Ok(())
    };
    let el = Element::new(
        &rt,
        def,
        Counter,
        renderer,
        AttributeMap::new().with("count", "5"),
    )?;
    el.host().add_controller(Rc::new(Announcer));
    let clicks = el.host().on("click", |event| {
        println!("  [event] {} ({})", event.name, event.detail);
    });

    println!("-- connect");
    el.connected()?;

    println!("-- click twice in one burst");
    let host = el.host();
    host.batch(|| -> Result<()> {
        for _ in 0..2 {
            let next = host.state("clicks")?.as_f64().unwrap_or_default() + 1.0;
            host.set_state("clicks", next)?;
            host.emit("click", next);
        }
        Ok(())
    })??;

    println!("-- external attribute writes");
    host.set_attribute("label", "Total")?;
    host.set_attribute("disabled", "false")?;
    host.set_property("disabled", true)?;
    host.remove_attribute("count")?;

    println!("-- disconnect");
    clicks.run();
    el.disconnected()?;
    log::info!("{:?}", el.render_stats());
    Ok(())
}
