#![allow(dead_code)]

use bson::oid::ObjectId;
use docmodel::{memory::InMemoryStore, prelude::*};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tagged)]
pub struct Contact {
    #[tag(primary = "phone", secondary = "Phone", bson = "phone", json = "phone")]
    pub phone: String,
    #[tag(primary = "email", secondary = "Email", bson = "email", json = "email,omitempty")]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tagged)]
pub struct User {
    #[serde(rename = "_id")]
    #[tag(bson = "_id", json = "id")]
    pub id: ObjectId,
    #[tag(primary = "name", secondary = "Name", bson = "name", json = "name")]
    pub name: String,
    #[tag(primary = "age", secondary = "Age", bson = "age", json = "age")]
    pub age: i32,
    #[tag(primary = "verified", secondary = "Verified", bson = "verified", json = "verified")]
    pub verified: bool,
    #[tag(nested, primary = "contact", secondary = "Contact", bson = "contact", json = "contact")]
    pub contact: Contact,
    #[tag(bson = "password", json = "-")]
    pub password: String,
    #[serde(default)]
    #[tag(bson = "credit", json = "credit")]
    pub credit: f64,
    #[serde(default)]
    #[tag(bson = "debit", json = "debit")]
    pub debit: f64,
}

impl Record for User {
    fn id(&self) -> ObjectId {
        self.id
    }
}

impl User {
    pub fn new(name: &str, age: i32) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            age,
            verified: false,
            contact: Contact {
                phone: "123456789".to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
            },
            password: "secret".to_string(),
            credit: 0.0,
            debit: 0.0,
        }
    }

    pub fn with_balance(mut self, credit: f64, debit: f64) -> Self {
        self.credit = credit;
        self.debit = debit;
        self
    }
}

/// Projection target for reads restricted to the public fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PublicUser {
    pub name: String,
    pub age: i32,
    pub contact: Contact,
}

pub async fn store() -> DocumentStore {
    DocumentStore::new(InMemoryStore::builder().build().await.unwrap())
}

pub fn users(store: &DocumentStore) -> TypedCollection<User> {
    store
        .collection::<User>("users")
        .unwrap()
        .with_public_fields(["name", "age", "contact"])
}

/// Inserts users aged 20 through 20 + count - 1, named `user-0`, `user-1`, ...
pub async fn seed(users: &TypedCollection<User>, count: i32) -> Vec<User> {
    let mut inserted = Vec::new();
    for n in 0..count {
        let user = User::new(&format!("user-{n}"), 20 + n);
        users.insert_one(&user).await.unwrap();
        inserted.push(user);
    }
    inserted
}
