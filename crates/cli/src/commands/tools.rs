//! `parley tools`: registered tool sets and their tools.

use parley_core::tool::ToolAnnotations;

pub fn run() -> anyhow::Result<()> {
    let registry = parley_tools::default_registry()?;

    for set_id in registry.tool_set_ids() {
        let Some(tool_set) = registry.tool_set(set_id) else {
            continue;
        };
        println!("  {set_id}");
        for tool in tool_set.list_tools() {
            println!("    {:<26} {}", tool.name, tool.description);
            let hints = hints(&tool.annotations);
            if !hints.is_empty() {
                println!("    {:<26} [{}]", "", hints.join(", "));
            }
        }
        println!();
    }
    Ok(())
}

fn hints(annotations: &ToolAnnotations) -> Vec<&'static str> {
    [
        (annotations.read_only_hint, "read-only"),
        (annotations.idempotent_hint, "idempotent"),
        (annotations.destructive_hint, "destructive"),
        (annotations.open_world_hint, "open-world"),
    ]
    .into_iter()
    .filter_map(|(set, label)| set.then_some(label))
    .collect()
}
