use {
	crate::store::{DocumentStore, StoreError},
	async_trait::async_trait,
	parking_lot::Mutex,
	serde_json::Value,
	std::{collections::HashMap, sync::Arc},
};

/// An in-process document store.
///
/// Collections are addressed by `(db, collection)`; selectors match a
/// single string-valued field. A fail switch makes the next N operations
/// return a transient backend error, for exercising retry paths.
#[derive(Clone, Default)]
pub struct MemoryStore {
	state: Arc<Mutex<StoreState>>,
}

#[derive(Default)]
struct StoreState {
	collections: HashMap<(String, String), Vec<Value>>,
	fail_next: u32,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts a document directly, bypassing the replace-only store
	/// capability. Tests use this to provision specs and state records.
	pub fn seed(&self, db: &str, collection: &str, doc: Value) {
		self
			.state
			.lock()
			.collections
			.entry((db.to_string(), collection.to_string()))
			.or_default()
			.push(doc);
	}

	/// Makes the next `n` store operations fail with a transient error.
	pub fn fail_next(&self, n: u32) {
		self.state.lock().fail_next = n;
	}

	/// All documents of a collection, for assertions.
	pub fn documents(&self, db: &str, collection: &str) -> Vec<Value> {
		self
			.state
			.lock()
			.collections
			.get(&(db.to_string(), collection.to_string()))
			.cloned()
			.unwrap_or_default()
	}

	fn check_fail(state: &mut StoreState) -> Result<(), StoreError> {
		if state.fail_next > 0 {
			state.fail_next -= 1;
			return Err(StoreError::Backend(
				"injected transient failure".to_string(),
			));
		}
		Ok(())
	}

	fn matches(doc: &Value, key: &str, value: &str) -> bool {
		doc.get(key).and_then(Value::as_str) == Some(value)
	}
}

#[async_trait]
impl DocumentStore for MemoryStore {
	async fn find_one(
		&self,
		db: &str,
		collection: &str,
		key: &str,
		value: &str,
	) -> Result<Option<Value>, StoreError> {
		let mut state = self.state.lock();
		Self::check_fail(&mut state)?;

		let docs = state
			.collections
			.get(&(db.to_string(), collection.to_string()));
		Ok(docs.and_then(|docs| {
			docs
				.iter()
				.find(|doc| Self::matches(doc, key, value))
				.cloned()
		}))
	}

	async fn replace_one(
		&self,
		db: &str,
		collection: &str,
		key: &str,
		value: &str,
		replacement: Value,
	) -> Result<(), StoreError> {
		let mut state = self.state.lock();
		Self::check_fail(&mut state)?;

		if let Some(docs) = state
			.collections
			.get_mut(&(db.to_string(), collection.to_string()))
		{
			if let Some(doc) =
				docs.iter_mut().find(|doc| Self::matches(doc, key, value))
			{
				*doc = replacement;
			}
		}
		Ok(())
	}
}
