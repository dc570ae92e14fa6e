//! Integration tests for multi-table competitions
//!
//! Covers seating from the waiting pool, table creation, refunds before the
//! start and table break-up when a table runs short.

mod common;

#[cfg(test)]
mod multi_table_tests {
    use super::common::{EngineCommand, FakeTableEngine, manager, next_update};
    use mtt_orchestrator::competition::{PlayerStatus, TableSeatSetting};
    use mtt_orchestrator::table::{JoinPlayer, TableId};
    use mtt_orchestrator::{
        Competition, CompetitionError, CompetitionId, CompetitionManager, CompetitionSetting,
        CompetitionStatus, ErrorKind, EventTopic,
    };
    use std::collections::HashSet;

    fn setting() -> CompetitionSetting {
        let mut setting = CompetitionSetting::multi_table("MTT".to_string(), 2, 20);
        setting.table = TableSeatSetting {
            max_seat_count: 4,
            min_player_count: 2,
        };
        setting.rebuy.max_times = 0;
        setting
    }

    async fn join(manager: &CompetitionManager, id: CompetitionId, player: &str) -> Competition {
        manager
            .player_join(id, None, JoinPlayer::new(player, 1000))
            .await
            .unwrap()
            .wait()
            .await
            .unwrap()
    }

    fn table_of(competition: &Competition, player: &str) -> TableId {
        competition.player(player).unwrap().current_table_id.unwrap()
    }

    #[tokio::test]
    async fn test_players_wait_until_a_table_can_open() {
        let engine = FakeTableEngine::new();
        let manager = manager(&engine);
        let competition = manager.create_competition(setting()).await.unwrap();
        assert!(competition.state.tables.is_empty());

        let c = join(&manager, competition.id, "p1").await;
        assert!(c.state.tables.is_empty());
        assert_eq!(c.player("p1").unwrap().current_table_id, None);

        let c = join(&manager, competition.id, "p2").await;
        assert_eq!(c.state.tables.len(), 1);
        assert_eq!(table_of(&c, "p1"), table_of(&c, "p2"));
        assert_eq!(
            engine.count(|cmd| matches!(cmd, EngineCommand::CreateTable(_))),
            1
        );
        // Not started yet, so no hand is dealt
        assert_eq!(
            engine.count(|cmd| matches!(cmd, EngineCommand::StartTableGame(_))),
            0
        );

        let c = join(&manager, competition.id, "p3").await;
        let t1 = table_of(&c, "p1");
        assert_eq!(table_of(&c, "p3"), t1);
        assert!(
            engine
                .commands()
                .contains(&EngineCommand::PlayerJoin(t1, "p3".to_string(), 1000))
        );
    }

    #[tokio::test]
    async fn test_refund_before_start_only() {
        let engine = FakeTableEngine::new();
        let manager = manager(&engine);
        let competition = manager.create_competition(setting()).await.unwrap();

        join(&manager, competition.id, "a").await;
        let c = join(&manager, competition.id, "b").await;
        let table_id = table_of(&c, "a");

        let c = manager
            .player_refund(competition.id, "a")
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert!(c.player("a").is_none());
        assert!(c.table(table_id).unwrap().find_player("a").is_none());
        assert!(
            engine
                .commands()
                .contains(&EngineCommand::PlayersLeave(table_id, vec!["a".to_string()]))
        );

        let err = manager
            .start_competition(competition.id)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CompetitionError::InsufficientPlayers {
                needed: 2,
                current: 1
            }
        ));

        join(&manager, competition.id, "c").await;
        let c = manager
            .start_competition(competition.id)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(c.state.status, CompetitionStatus::DelayedBuyIn);

        let err = manager
            .player_refund(competition.id, "b")
            .await
            .unwrap()
            .wait()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RejectedByState);
    }

    #[tokio::test]
    async fn test_short_table_is_broken_up_and_players_reseated() {
        let engine = FakeTableEngine::new();
        let manager = manager(&engine);
        let competition = manager.create_competition(setting()).await.unwrap();

        for player in ["p1", "p2", "p3", "p4", "p5"] {
            join(&manager, competition.id, player).await;
        }
        let c = join(&manager, competition.id, "p6").await;
        assert_eq!(c.state.tables.len(), 2);
        let t1 = table_of(&c, "p1");
        let t2 = table_of(&c, "p5");
        assert_ne!(t1, t2);
        assert_eq!(table_of(&c, "p4"), t1);
        assert_eq!(table_of(&c, "p6"), t2);

        let c = manager
            .start_competition(competition.id)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(c.state.status, CompetitionStatus::DelayedBuyIn);
        assert_eq!(
            engine.count(|cmd| matches!(cmd, EngineCommand::StartTableGame(_))),
            2
        );

        let dispatcher = manager.table_event_dispatcher();
        let mut updates = manager.subscribe(EventTopic::Updated).await;

        // p4 busts with no re-buys allowed
        dispatcher
            .on_table_updated(engine.settle(t1, &[("p4", 0)]))
            .await
            .unwrap();
        let c = next_update(&mut updates).await;
        assert_eq!(c.player("p4").unwrap().status, PlayerStatus::Knockout);
        assert_eq!(c.player("p4").unwrap().rank, 6);
        assert_eq!(c.state.rankings.len(), 6);
        assert!(engine.commands().contains(&EngineCommand::TableGameOpen(t1)));

        // p6 busts, leaving p5 alone with a free seat on t1
        dispatcher
            .on_table_updated(engine.settle(t2, &[("p5", 2000), ("p6", 0)]))
            .await
            .unwrap();
        let c = next_update(&mut updates).await;
        assert_eq!(c.player("p6").unwrap().rank, 5);
        assert_eq!(
            c.player("p5").unwrap().status,
            PlayerStatus::WaitingTableBalancing
        );
        assert!(engine.commands().contains(&EngineCommand::BalanceTable(t2)));
        assert!(!engine.commands().contains(&EngineCommand::TableGameOpen(t2)));

        dispatcher
            .on_table_updated(engine.close(t2))
            .await
            .unwrap();
        let c = next_update(&mut updates).await;
        assert_eq!(c.state.tables.len(), 1);
        assert_eq!(table_of(&c, "p5"), t1);
        assert_eq!(c.player("p5").unwrap().status, PlayerStatus::Playing);
        assert_eq!(c.player("p5").unwrap().chips, 2000);
        assert!(
            engine
                .commands()
                .contains(&EngineCommand::PlayerJoin(t1, "p5".to_string(), 2000))
        );
        assert_ne!(c.state.status, CompetitionStatus::End);

        let c = manager
            .close_competition(competition.id)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(c.state.status, CompetitionStatus::End);
        assert!(c.state.end_at.is_some());

        let ranked: Vec<&str> = c
            .state
            .rankings
            .iter()
            .map(|r| r.as_ref().unwrap().player_id.as_str())
            .collect();
        let unique: HashSet<&str> = ranked.iter().copied().collect();
        assert_eq!(ranked.len(), 6);
        assert_eq!(unique.len(), 6);
        assert_eq!(ranked[0], "p5");
        assert_eq!(&ranked[4..], &["p6", "p4"]);
    }

    #[tokio::test]
    async fn test_engine_rejection_requeues_waiting_players() {
        let engine = FakeTableEngine::new();
        let manager = manager(&engine);
        let competition = manager.create_competition(setting()).await.unwrap();

        join(&manager, competition.id, "p1").await;
        join(&manager, competition.id, "p2").await;

        engine.reject_joins(true);
        let mut errors = manager.subscribe(EventTopic::Error).await;
        let c = join(&manager, competition.id, "p3").await;

        // The buy-in stands, the seat does not
        assert_eq!(c.state.players.len(), 3);
        assert_eq!(c.player("p3").unwrap().current_table_id, None);
        assert!(errors.try_recv().is_ok());

        engine.reject_joins(false);
        let c = join(&manager, competition.id, "p4").await;
        let t1 = table_of(&c, "p1");
        assert_eq!(table_of(&c, "p3"), t1);
        assert_eq!(table_of(&c, "p4"), t1);
    }

    #[tokio::test]
    async fn test_last_survivor_ends_competition_instead_of_reseating() {
        let engine = FakeTableEngine::new();
        let manager = manager(&engine);
        let mut heads_up = setting();
        heads_up.table.min_player_count = 1;
        let competition = manager.create_competition(heads_up).await.unwrap();

        // One player alone never gets a table
        let c = join(&manager, competition.id, "p1").await;
        assert!(c.state.tables.is_empty());
        let c = join(&manager, competition.id, "p2").await;
        let t1 = table_of(&c, "p1");
        assert_eq!(table_of(&c, "p2"), t1);

        manager
            .start_competition(competition.id)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();

        let dispatcher = manager.table_event_dispatcher();
        let mut updates = manager.subscribe(EventTopic::Updated).await;

        let mut settled = engine.settle(t1, &[("p1", 2000), ("p2", 0)]);
        settled.should_close = true;
        dispatcher.on_table_updated(settled).await.unwrap();
        let c = next_update(&mut updates).await;
        assert_eq!(c.player("p2").unwrap().status, PlayerStatus::Knockout);
        assert!(engine.commands().contains(&EngineCommand::CloseTable(t1)));

        dispatcher.on_table_updated(engine.close(t1)).await.unwrap();
        let c = next_update(&mut updates).await;

        assert_eq!(c.state.status, CompetitionStatus::End);
        assert!(c.state.tables.is_empty());
        assert_eq!(
            engine.count(|cmd| matches!(cmd, EngineCommand::CreateTable(_))),
            1
        );
        assert_eq!(c.player("p1").unwrap().rank, 1);
        assert_eq!(c.player("p2").unwrap().rank, 2);
        let ranked: Vec<&str> = c
            .state
            .rankings
            .iter()
            .map(|r| r.as_ref().unwrap().player_id.as_str())
            .collect();
        assert_eq!(ranked, vec!["p1", "p2"]);
    }
}
