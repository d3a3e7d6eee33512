//! Persisted todo store
//!
//! Run twice: the second run picks up the todos saved by the first.

use serde::{Deserialize, Serialize};
use statebox::{persist, FileStorage, PersistOptions, Store};
use std::sync::Arc;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct TodoItem {
    id: usize,
    text: String,
    completed: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct AppState {
    todos: Vec<TodoItem>,
    filter: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== Persisted Todos ===\n");

    let dir = std::env::temp_dir().join("statebox-demo");
    let storage = Arc::new(FileStorage::new(&dir)?);

    // Create a store and hydrate it from disk
    let store = persist(
        Store::new(AppState {
            todos: vec![],
            filter: "all".to_string(),
        }),
        PersistOptions::new("todos")
            .storage(storage.clone())
            .version(1)
            // Only the todos are worth keeping across runs
            .partialize(|state: &AppState| serde_json::json!({ "todos": state.todos })),
    );
    println!(
        "Hydrated: {}, {} todos loaded from {}",
        store.persist().has_hydrated(),
        store.get_state().todos.len(),
        storage.path_for("todos").display()
    );

    // Only report changes to the number of open todos
    store.subscribe_with_selector(
        |state| state.todos.iter().filter(|t| !t.completed).count(),
        |open, _| println!("Active todos: {open}"),
    );

    // Add a todo
    println!("\nAdding todo...");
    store.update(|state| {
        let id = state.todos.len() + 1;
        state.todos.push(TodoItem {
            id,
            text: format!("Learn statebox #{id}"),
            completed: false,
        });
    });

    // Complete the first open todo
    println!("\nCompleting todo...");
    store.update(|state| {
        if let Some(todo) = state.todos.iter_mut().find(|t| !t.completed) {
            todo.completed = true;
        }
    });

    // Changing the filter is not persisted and does not notify the selector
    store.update(|state| state.filter = "completed".to_string());

    println!("\nFinal state: {:#?}", store.get_state());
    Ok(())
}
