//! Integration tests for prestige gating, the reset hook, and skill
//! visibility across prestige tiers.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use idleskills_core::catalog::StaticCatalog;
use idleskills_core::config::GameConfig;
use idleskills_core::facade::ProgressionFacade;
use idleskills_core::level_curve::LevelCurve;
use idleskills_core::prestige::{PrestigeGate, PrestigeTable};
use idleskills_core::repository::{
    InMemoryPrestigeRepository, InMemorySkillRepository, RepositoryError, SkillRepository,
};
use idleskills_types::{Prestige, Skill, TrainingState};
use tokio::sync::watch;

struct Harness {
    repo: Arc<InMemorySkillRepository>,
    gate: Arc<PrestigeGate>,
    facade: ProgressionFacade,
}

fn harness(levels: &[(&str, u32, u64)]) -> Harness {
    let config = GameConfig::default();
    let skills = config
        .skills
        .initial
        .iter()
        .map(|name| {
            levels
                .iter()
                .find(|(n, _, _)| n == name)
                .map_or_else(
                    || Skill::new(name.as_str()),
                    |(n, level, xp)| Skill {
                        name: (*n).to_owned(),
                        level: *level,
                        xp: *xp,
                    },
                )
        })
        .collect();
    let repo = Arc::new(InMemorySkillRepository::with_skills(skills));
    let gate = Arc::new(
        PrestigeGate::new(
            Arc::clone(&repo) as Arc<dyn SkillRepository>,
            Arc::new(InMemoryPrestigeRepository::default()),
            PrestigeTable::from_config(&config.prestige),
        )
        .unwrap(),
    );
    let facade = ProgressionFacade::new(
        Arc::clone(&repo) as Arc<dyn SkillRepository>,
        Arc::new(StaticCatalog::from_config(&config.catalog)),
        Arc::clone(&gate),
        LevelCurve::from_config(&config.level_curve),
        config.training,
    )
    .unwrap();
    Harness { repo, gate, facade }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn one_level_short_blocks_prestige() {
    let h = harness(&[("Woodcutting", 99, 0), ("Mining", 99, 0), ("Fishing", 98, 0)]);
    h.facade.select_skill("Woodcutting").await.unwrap();
    let session = h.facade.snapshot().session.unwrap().id;

    assert_eq!(
        h.gate.evaluate().unwrap(),
        Prestige {
            level: 0,
            can_prestige: false
        }
    );
    assert!(!h.facade.prestige().await.unwrap());

    // No side effects: training continues and nothing was reset.
    let snapshot = h.facade.snapshot();
    assert_eq!(snapshot.state, TrainingState::Running);
    assert_eq!(snapshot.session.unwrap().id, session);
    assert_eq!(h.repo.get("Woodcutting").unwrap().level, 99);
    h.facade.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn prestige_resets_training_then_skills() {
    let h = harness(&[("Woodcutting", 99, 40), ("Mining", 99, 0), ("Fishing", 99, 0)]);
    assert!(h.gate.current().can_prestige);

    h.facade.select_skill("Woodcutting").await.unwrap();
    tokio::time::sleep(Duration::from_millis(3_000)).await;

    assert!(h.facade.prestige().await.unwrap());
    settle().await;

    assert_eq!(
        h.gate.current(),
        Prestige {
            level: 1,
            can_prestige: false
        }
    );
    assert!(h.repo.get_all().unwrap().iter().all(|s| *s == s.reset()));

    let snapshot = h.facade.snapshot();
    assert_eq!(snapshot.state, TrainingState::Idle);
    assert!(snapshot.active_skill.is_none());
    assert!(snapshot.session.is_none());
    // Tier 1 shows six skills.
    assert_eq!(snapshot.skills.len(), 6);
    assert!(snapshot.skills.iter().any(|s| s.name == "Cooking"));

    // Nothing is credited after the reset.
    tokio::time::sleep(Duration::from_millis(20_000)).await;
    assert_eq!(h.repo.get("Woodcutting").unwrap(), Skill::new("Woodcutting"));
    h.facade.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn beyond_last_tier_prestige_is_never_available() {
    let h = harness(&[("Woodcutting", 99, 0), ("Mining", 99, 0), ("Fishing", 99, 0)]);
    assert!(h.facade.prestige().await.unwrap());

    // Tier 1 requires its six visible skills at 99.
    for name in ["Woodcutting", "Mining", "Fishing", "Firemaking", "Smelting", "Cooking"] {
        h.repo
            .update(Skill {
                name: name.to_owned(),
                level: 99,
                xp: 0,
            })
            .unwrap();
    }
    assert!(h.facade.prestige().await.unwrap());
    assert_eq!(h.gate.current().level, 2);
    settle().await;

    // Level 2 has no tier: visibility falls back, prestige does not.
    assert_eq!(h.facade.snapshot().skills.len(), 6);
    assert!(h.gate.requirements(2).is_none());
    for skill in h.repo.get_all().unwrap() {
        h.repo
            .update(Skill {
                level: 99,
                ..skill
            })
            .unwrap();
    }
    assert!(!h.gate.evaluate().unwrap().can_prestige);
    assert!(!h.facade.prestige().await.unwrap());
    h.facade.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn watcher_flags_eligibility_from_training() {
    let curve = LevelCurve::default();
    let almost = curve.xp_for_next_level(98).checked_sub(1).unwrap();
    let h = harness(&[("Woodcutting", 99, 0), ("Mining", 99, 0), ("Fishing", 98, almost)]);
    let watcher = h.gate.spawn_watcher();
    let mut prestige = h.gate.subscribe();
    assert!(!prestige.borrow_and_update().can_prestige);

    // Fishing has no catalog entries: basic training gives 1 XP per second.
    h.facade.select_skill("Fishing").await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_050)).await;

    assert_eq!(h.repo.get("Fishing").unwrap().level, 99);
    assert!(prestige.has_changed().unwrap());
    assert!(prestige.borrow_and_update().can_prestige);
    assert!(h.facade.snapshot().active_skill_record().is_some_and(|s| s.level == 99));

    watcher.abort();
    h.facade.shutdown().await;
}

/// Skill store whose full reads take a few milliseconds, widening the gap
/// between the prestige reset hook and the skill reset.
struct SlowRepository {
    inner: InMemorySkillRepository,
}

impl SkillRepository for SlowRepository {
    fn get(&self, name: &str) -> Result<Skill, RepositoryError> {
        self.inner.get(name)
    }

    fn get_all(&self) -> Result<Vec<Skill>, RepositoryError> {
        std::thread::sleep(Duration::from_millis(20));
        self.inner.get_all()
    }

    fn observe(&self) -> watch::Receiver<Vec<Skill>> {
        self.inner.observe()
    }

    fn update(&self, skill: Skill) -> Result<Skill, RepositoryError> {
        self.inner.update(skill)
    }

    fn reset_all(&self, skills: &[Skill]) -> Result<Vec<Skill>, RepositoryError> {
        self.inner.reset_all(skills)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn selection_during_prestige_sees_reset_levels() {
    let config = GameConfig::default();
    let maxed = config
        .skills
        .initial
        .iter()
        .map(|name| Skill {
            name: name.clone(),
            level: 99,
            xp: 0,
        })
        .collect();
    let repo = Arc::new(SlowRepository {
        inner: InMemorySkillRepository::with_skills(maxed),
    });
    let gate = Arc::new(
        PrestigeGate::new(
            Arc::clone(&repo) as Arc<dyn SkillRepository>,
            Arc::new(InMemoryPrestigeRepository::default()),
            PrestigeTable::from_config(&config.prestige),
        )
        .unwrap(),
    );
    let facade = Arc::new(
        ProgressionFacade::new(
            Arc::clone(&repo) as Arc<dyn SkillRepository>,
            Arc::new(StaticCatalog::from_config(&config.catalog)),
            Arc::clone(&gate),
            LevelCurve::from_config(&config.level_curve),
            config.training,
        )
        .unwrap(),
    );

    facade.select_skill("Woodcutting").await.unwrap();
    assert_eq!(facade.snapshot().active_method.unwrap().name, "Willow Tree");

    // Reselect as soon as the reset hook clears the published training.
    let mut published = facade.subscribe();
    let racer = {
        let facade = Arc::clone(&facade);
        tokio::spawn(async move {
            let cleared = published
                .wait_for(|s| s.active_skill.is_none())
                .await
                .is_ok();
            assert!(cleared);
            facade.select_skill("Woodcutting").await.unwrap();
        })
    };

    assert!(facade.prestige().await.unwrap());
    racer.await.unwrap();

    let woodcutting = repo.get("Woodcutting").unwrap();
    assert_eq!(woodcutting.level, 1);
    assert_eq!(gate.current().level, 1);

    let snapshot = facade.snapshot();
    assert_eq!(snapshot.state, TrainingState::Running);
    let method = snapshot.active_method.unwrap();
    let tool = snapshot.active_tool.unwrap();
    assert!(method.required_level <= woodcutting.level);
    assert!(tool.required_level <= woodcutting.level);
    assert_eq!(method.name, "Tree");
    assert_eq!(tool.name, "Bronze Axe");
    facade.shutdown().await;
}
