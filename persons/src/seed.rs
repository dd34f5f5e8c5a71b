use common_cache::{EntityStore, StoreError};

use crate::persons::person_models::Person;

pub fn demo_persons() -> Vec<Person> {
    [(1, "p1", 25), (2, "p2", 28), (3, "p3", 60)]
        .into_iter()
        .map(|(id, firstname, age)| Person {
            id,
            firstname: firstname.to_string(),
            lastname: "test".to_string(),
            age,
        })
        .collect()
}

/// Upsert the demo persons straight into the store, bypassing the cache.
pub async fn seed_persons(store: &dyn EntityStore<Person>) -> Result<(), StoreError> {
    let count = store.count().await?;
    tracing::info!(count, "Persons before seeding");

    for person in demo_persons() {
        store.save(&person).await?;
    }

    let persons = store.find_all().await?;
    tracing::info!(count = persons.len(), ?persons, "Persons after seeding");

    Ok(())
}
