//! In-memory state store for tests and ephemeral deployments.

use dashmap::DashMap;
use parking_lot::Mutex;

use super::{ConversationRow, InterestKeyword, SocialBatteryState, StateStore, StoredTrait};
use crate::errors::StoreError;

/// Volatile [`StateStore`] backed by concurrent maps.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    battery: DashMap<(String, String), SocialBatteryState>,
    traits: DashMap<(String, String), StoredTrait>,
    interests: DashMap<(String, String), InterestKeyword>,
    conversation: Mutex<Vec<ConversationRow>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn battery_state(
        &self,
        profile_id: &str,
        channel_id: &str,
    ) -> Result<Option<SocialBatteryState>, StoreError> {
        Ok(self
            .battery
            .get(&(profile_id.to_string(), channel_id.to_string()))
            .map(|entry| entry.clone()))
    }

    fn upsert_battery_state(&self, state: &SocialBatteryState) -> Result<(), StoreError> {
        self.battery.insert(
            (state.profile_id.clone(), state.channel_id.clone()),
            state.clone(),
        );
        Ok(())
    }

    fn delete_battery_state(&self, profile_id: &str, channel_id: &str) -> Result<(), StoreError> {
        self.battery
            .remove(&(profile_id.to_string(), channel_id.to_string()));
        Ok(())
    }

    fn delete_battery_states_for_profile(&self, profile_id: &str) -> Result<(), StoreError> {
        self.battery.retain(|(pid, _), _| pid != profile_id);
        Ok(())
    }

    fn trait_row(&self, profile_id: &str, name: &str) -> Result<Option<StoredTrait>, StoreError> {
        Ok(self
            .traits
            .get(&(profile_id.to_string(), name.to_string()))
            .map(|entry| entry.clone()))
    }

    fn traits(&self, profile_id: &str) -> Result<Vec<StoredTrait>, StoreError> {
        let mut rows: Vec<StoredTrait> = self
            .traits
            .iter()
            .filter(|entry| entry.key().0 == profile_id)
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    fn upsert_trait(&self, profile_id: &str, row: &StoredTrait) -> Result<(), StoreError> {
        self.traits
            .insert((profile_id.to_string(), row.name.clone()), row.clone());
        Ok(())
    }

    fn clear_traits(&self, profile_id: &str) -> Result<(), StoreError> {
        self.traits.retain(|(pid, _), _| pid != profile_id);
        Ok(())
    }

    fn interests(&self, profile_id: &str) -> Result<Vec<InterestKeyword>, StoreError> {
        let mut rows: Vec<InterestKeyword> = self
            .interests
            .iter()
            .filter(|entry| entry.key().0 == profile_id)
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by(|a, b| a.keyword.cmp(&b.keyword));
        Ok(rows)
    }

    fn upsert_interest(&self, profile_id: &str, row: &InterestKeyword) -> Result<(), StoreError> {
        self.interests
            .insert((profile_id.to_string(), row.keyword.clone()), row.clone());
        Ok(())
    }

    fn remove_interest(&self, profile_id: &str, keyword: &str) -> Result<bool, StoreError> {
        Ok(self
            .interests
            .remove(&(profile_id.to_string(), keyword.to_string()))
            .is_some())
    }

    fn clear_interests(&self, profile_id: &str) -> Result<(), StoreError> {
        self.interests.retain(|(pid, _), _| pid != profile_id);
        Ok(())
    }

    fn append_conversation(&self, row: &ConversationRow) -> Result<(), StoreError> {
        self.conversation.lock().push(row.clone());
        Ok(())
    }

    fn recent_conversation(
        &self,
        profile_id: &str,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationRow>, StoreError> {
        let log = self.conversation.lock();
        let matching: Vec<ConversationRow> = log
            .iter()
            .filter(|row| row.profile_id == profile_id && row.channel_id == channel_id)
            .cloned()
            .collect();
        let start = matching.len().saturating_sub(limit);
        Ok(matching[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_profile_scoped_deletes() {
        let store = MemoryStateStore::new();
        for channel in ["c1", "c2"] {
            store
                .upsert_battery_state(&SocialBatteryState {
                    profile_id: "p1".into(),
                    channel_id: channel.into(),
                    message_count: 1,
                    window_start: Some(Utc::now()),
                    last_message_at: Some(Utc::now()),
                })
                .unwrap();
        }
        store
            .upsert_battery_state(&SocialBatteryState {
                profile_id: "p2".into(),
                channel_id: "c1".into(),
                message_count: 1,
                window_start: Some(Utc::now()),
                last_message_at: Some(Utc::now()),
            })
            .unwrap();

        store.delete_battery_states_for_profile("p1").unwrap();
        assert!(store.battery_state("p1", "c1").unwrap().is_none());
        assert!(store.battery_state("p1", "c2").unwrap().is_none());
        assert!(store.battery_state("p2", "c1").unwrap().is_some());
    }

    #[test]
    fn test_recent_conversation_limit() {
        let store = MemoryStateStore::new();
        for i in 0..4 {
            store
                .append_conversation(&ConversationRow {
                    profile_id: "p1".into(),
                    channel_id: "c1".into(),
                    author_id: "u1".into(),
                    author_name: "user".into(),
                    user_message: format!("m{i}"),
                    bot_response: format!("r{i}"),
                    created_at: Utc::now(),
                })
                .unwrap();
        }
        let recent = store.recent_conversation("p1", "c1", 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].user_message, "m2");
        assert_eq!(recent[1].user_message, "m3");
    }
}
