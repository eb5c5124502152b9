#[cfg(test)]
mod tests {
    use parking_lot::RwLock;
    use serde_json::json;
    use std::sync::Arc;

    use grocha_channels::{
        Action, HistoryMessage, IncomingMessage, MockPlatform, Platform, PlatformEvent,
        ReactionCount,
    };
    use grocha_config::{FaultMode, GrochaConfig};
    use grocha_core::{
        CustomEmoji, EmojiRef, GrochaError, Member, MessageId, MessageRef, Result,
    };
    use grocha_memory::InMemoryBackend;
    use grocha_runtime::commands::{EmojiTally, format_wait, parse_city, weekend_wait};
    use grocha_runtime::*;
    use grocha_services::{Forecast, MockDictionary, MockOperations, MockWeather, Place};

    const GUILD: u64 = 100;
    const MAIN: u64 = 10;
    const DEBUG: u64 = 11;
    const RANDOM: u64 = 13;

    fn bot() -> Member {
        Member::bot(1, "Grocha")
    }
    fn alice() -> Member {
        Member::new(2, "alice")
    }
    fn bob() -> Member {
        Member::new(3, "bob")
    }
    fn carol() -> Member {
        Member::new(4, "carol")
    }
    fn dave() -> Member {
        Member::new(5, "dave")
    }
    fn eve() -> Member {
        Member::new(6, "eve")
    }

    fn grant() -> EmojiRef {
        EmojiRef::from(&CustomEmoji::new(42, "grant"))
    }

    fn platform() -> MockPlatform {
        MockPlatform::new(bot())
            .with_text_channel(MAIN, "general")
            .with_text_channel(DEBUG, "debug")
            .with_text_channel(12, "bienvenue")
            .with_text_channel(RANDOM, "random")
            .with_role(20, "membre")
            .with_emoji(CustomEmoji::new(42, "grant"))
            .with_emoji(CustomEmoji::new(43, "lick"))
            .with_emoji(CustomEmoji::new(44, "com"))
            .with_emoji(CustomEmoji::new(45, "cat"))
            .with_member(bot())
            .with_member(alice())
            .with_member(bob())
            .with_member(carol())
            .with_member(dave())
    }

    fn forecast() -> Forecast {
        serde_json::from_value(json!({
            "timezone_offset": 3600,
            "current": { "dt": 1_700_000_000, "temp": 11.3, "feels_like": 9.0, "weather": [{ "id": 800 }] }
        }))
        .unwrap()
    }

    struct Harness {
        platform: Arc<MockPlatform>,
        backend: Arc<InMemoryBackend>,
        weather: Arc<MockWeather>,
        ops: Arc<MockOperations>,
        ctx: SessionContext,
        session: GuildSession,
    }

    impl Harness {
        async fn new() -> Self {
            Self::with(platform(), GrochaConfig::default()).await
        }

        async fn with(platform: MockPlatform, config: GrochaConfig) -> Self {
            let platform = Arc::new(platform);
            let backend = Arc::new(InMemoryBackend::new());
            let weather = Arc::new(MockWeather::new(forecast()).with_place(
                "Lyon",
                Place {
                    name: "Lyon, FR".into(),
                    lat: 45.75,
                    lon: 4.85,
                },
            ));
            let ops = Arc::new(MockOperations::default());
            let ctx = SessionContext {
                platform: platform.clone(),
                backend: backend.clone(),
                weather: weather.clone(),
                dictionary: Arc::new(MockDictionary::new().with_word("alarm")),
                ops: ops.clone(),
                config: Arc::new(RwLock::new(config)),
                rng_seed: Some(7),
            };
            let session = GuildSession::open(GUILD, ctx.clone()).await.unwrap();
            Self {
                platform,
                backend,
                weather,
                ops,
                ctx,
                session,
            }
        }

        async fn handle(&mut self, event: PlatformEvent) -> Result<()> {
            self.session.handle(event).await
        }

        /// A message addressed to the bot.
        async fn command(&mut self, id: MessageId, author: &Member, text: &str) -> Result<()> {
            self.command_with(id, author, text, vec![]).await
        }

        async fn command_with(
            &mut self,
            id: MessageId,
            author: &Member,
            text: &str,
            others: Vec<Member>,
        ) -> Result<()> {
            let mut mentions = vec![bot()];
            mentions.extend(others);
            self.handle(message(id, author, &format!("<@1> {text}"), mentions))
                .await
        }

        async fn react(&mut self, anchor: MessageId, reactors: Vec<Member>) -> Result<()> {
            self.platform.set_reactors(anchor, &grant(), reactors.clone());
            let user = reactors.last().map_or(2, |m| m.id);
            self.handle(PlatformEvent::Reaction {
                guild: GUILD,
                message: MessageRef::new(MAIN, anchor),
                user,
                emoji: grant(),
            })
            .await
        }

        fn kicks(&self) -> Vec<u64> {
            self.platform
                .actions()
                .into_iter()
                .filter_map(|a| match a {
                    Action::Kick { member, .. } => Some(member),
                    _ => None,
                })
                .collect()
        }

        fn sends_to(&self, channel: u64) -> Vec<String> {
            self.platform
                .actions()
                .into_iter()
                .filter_map(|a| match a {
                    Action::Send {
                        channel: c, text, ..
                    } if c == channel => Some(text),
                    _ => None,
                })
                .collect()
        }
    }

    fn message(id: MessageId, author: &Member, content: &str, mentions: Vec<Member>) -> PlatformEvent {
        PlatformEvent::Message(IncomingMessage {
            guild: GUILD,
            message: MessageRef::new(MAIN, id),
            author: author.clone(),
            content: content.to_string(),
            mentions,
            channel_mentions: vec![],
            mentions_everyone: false,
            reply_to_author: None,
        })
    }

    // ── Routing ────────────────────────────────────────────────

    mod routing {
        use super::*;
        use grocha_core::text::tokenize;

        #[test]
        fn test_first_keyword_wins() {
            let table = CommandTable::new();
            let tokens = tokenize("<@1> lick puis kick");
            assert_eq!(table.route(&tokens, true), Route::Dispatch(Command::Lick));
        }

        #[test]
        fn test_keywords_ignore_case_and_accents() {
            let table = CommandTable::new();
            let tokens = tokenize("<@1> MÉTÉO à Lyon");
            assert_eq!(table.route(&tokens, true), Route::Dispatch(Command::Meteo));
            let tokens = tokenize("<@1> Révolution !");
            assert_eq!(
                table.route(&tokens, true),
                Route::Dispatch(Command::Revolution)
            );
        }

        #[test]
        fn test_unknown_and_unaddressed() {
            let table = CommandTable::new();
            let tokens = tokenize("<@1> bonjour toi");
            assert_eq!(table.route(&tokens, true), Route::Unrecognized);
            let tokens = tokenize("kick lick");
            assert_eq!(table.route(&tokens, false), Route::Autoreact);
        }

        #[test]
        fn test_every_command_has_a_keyword() {
            let table = CommandTable::new();
            for command in Command::ALL {
                assert_eq!(table.lookup(command.keyword()), Some(command));
            }
        }
    }

    // ── Session bootstrap and addressing ───────────────────────

    mod session {
        use super::*;

        #[tokio::test]
        async fn test_missing_main_role_is_not_found() {
            let platform = Arc::new(MockPlatform::new(bot()).with_text_channel(MAIN, "general"));
            let ctx = SessionContext {
                platform: platform.clone(),
                backend: Arc::new(InMemoryBackend::new()),
                weather: Arc::new(MockWeather::new(forecast())),
                dictionary: Arc::new(MockDictionary::new()),
                ops: Arc::new(MockOperations::default()),
                config: Arc::new(RwLock::new(GrochaConfig::default())),
                rng_seed: Some(1),
            };
            let err = GuildSession::open(GUILD, ctx).await.err().unwrap();
            assert!(matches!(err, GrochaError::NotFound(_)));
        }

        #[tokio::test]
        async fn test_directory_resolved_by_name() {
            let h = Harness::new().await;
            let dir = h.session.directory();
            assert_eq!(dir.main.as_ref().map(|c| c.id), Some(MAIN));
            assert_eq!(dir.debug.as_ref().map(|c| c.id), Some(DEBUG));
            assert_eq!(dir.welcome.as_ref().map(|c| c.id), Some(12));
            assert_eq!(dir.main_role.id, 20);
            assert_eq!(dir.grant_markup(), "<:grant:42>");
        }

        #[tokio::test]
        async fn test_ready_posts_awakening() {
            let mut h = Harness::new().await;
            h.handle(PlatformEvent::Ready { guild: GUILD }).await.unwrap();
            assert_eq!(h.sends_to(DEBUG), vec!["MAOOWWWWWW _(I just awakened)_"]);
        }

        #[tokio::test]
        async fn test_unrecognized_replies_maou() {
            let mut h = Harness::new().await;
            h.command(500, &alice(), "bonjour").await.unwrap();
            assert_eq!(h.platform.last_text().as_deref(), Some("MAOU?"));
        }

        #[tokio::test]
        async fn test_own_messages_ignored() {
            let mut h = Harness::new().await;
            h.handle(message(500, &bot(), "<@1> lick", vec![bot()]))
                .await
                .unwrap();
            assert!(h.platform.actions().is_empty());
        }

        #[tokio::test]
        async fn test_reply_to_bot_is_not_a_command() {
            let mut h = Harness::new().await;
            let PlatformEvent::Message(mut msg) = message(500, &alice(), "<@1> lick", vec![bot()])
            else {
                unreachable!()
            };
            msg.reply_to_author = Some(bot().id);
            h.handle(PlatformEvent::Message(msg)).await.unwrap();
            assert!(h.platform.actions().is_empty());
        }

        #[tokio::test]
        async fn test_everyone_mention_is_not_a_command() {
            let mut h = Harness::new().await;
            let PlatformEvent::Message(mut msg) =
                message(500, &alice(), "@everyone <@1> lick", vec![bot()])
            else {
                unreachable!()
            };
            msg.mentions_everyone = true;
            h.handle(PlatformEvent::Message(msg)).await.unwrap();
            assert!(h.platform.actions().is_empty());
        }

        #[tokio::test]
        async fn test_lick_targets() {
            let mut h = Harness::new().await;
            h.command_with(500, &alice(), "lick <@3> <@4>", vec![bob(), carol()])
                .await
                .unwrap();
            assert_eq!(
                h.platform.last_text().as_deref(),
                Some("<:lick:43> <@3> <:lick:43> <@4> <:lick:43>")
            );
            h.command(501, &alice(), "lick").await.unwrap();
            assert_eq!(
                h.platform.last_text().as_deref(),
                Some("<:lick:43> <@2> <:lick:43>")
            );
        }
    }

    // ── Greeting and role grant ────────────────────────────────

    mod greet {
        use super::*;

        #[tokio::test]
        async fn test_join_then_single_approval_grants_role() {
            let mut h = Harness::new().await;
            let anchor = h.platform.peek_next_id();
            h.handle(PlatformEvent::MemberJoined {
                guild: GUILD,
                member: eve(),
            })
            .await
            .unwrap();

            let posted = h.sends_to(MAIN);
            assert_eq!(posted.len(), 1);
            assert!(posted[0].starts_with("MAOU! **eve** vient d'arriver sur le serveur."));
            assert!(posted[0].contains("<:grant:42>"));
            assert_eq!(h.session.approvals().len(), 1);

            h.react(anchor, vec![alice()]).await.unwrap();
            let granted: Vec<Action> = h
                .platform
                .actions()
                .into_iter()
                .filter(|a| matches!(a, Action::GrantRole { .. }))
                .collect();
            assert_eq!(granted.len(), 1);
            let Action::GrantRole {
                member,
                role,
                reason,
                ..
            } = &granted[0]
            else {
                unreachable!()
            };
            assert_eq!((*member, *role), (6, 20));
            assert!(reason.starts_with("Permission accordée par alice & Grocha le "));
            assert!(h.session.approvals().is_empty());
        }

        #[tokio::test]
        async fn test_other_emoji_ignored() {
            let mut h = Harness::new().await;
            let anchor = h.platform.peek_next_id();
            h.handle(PlatformEvent::MemberJoined {
                guild: GUILD,
                member: eve(),
            })
            .await
            .unwrap();
            h.handle(PlatformEvent::Reaction {
                guild: GUILD,
                message: MessageRef::new(MAIN, anchor),
                user: 2,
                emoji: EmojiRef::from(&CustomEmoji::new(45, "cat")),
            })
            .await
            .unwrap();
            assert_eq!(h.session.approvals().len(), 1);
        }
    }

    // ── Kick votes ─────────────────────────────────────────────

    mod kick {
        use super::*;

        async fn open_vote(h: &mut Harness, subjects: Vec<Member>) -> MessageId {
            let anchor = h.platform.peek_next_id();
            h.command_with(500, &alice(), "kick", subjects).await.unwrap();
            anchor
        }

        #[tokio::test]
        async fn test_vote_message() {
            let mut h = Harness::new().await;
            open_vote(&mut h, vec![dave()]).await;
            assert_eq!(
                h.sends_to(MAIN),
                vec![
                    "MAOU! **dave** est sur le point d'être kické.\nRéagissez à ce message avec au moins 3 emojis <:grant:42> pour valider la décision!"
                ]
            );
        }

        #[tokio::test]
        async fn test_two_reactors_do_not_kick_three_do() {
            let mut h = Harness::new().await;
            let anchor = open_vote(&mut h, vec![dave()]).await;

            h.react(anchor, vec![alice(), bob()]).await.unwrap();
            assert!(h.kicks().is_empty());
            assert_eq!(h.session.approvals().len(), 1);

            h.react(anchor, vec![alice(), bob(), carol()]).await.unwrap();
            assert_eq!(h.kicks(), vec![5]);
            assert!(h.session.approvals().is_empty());
        }

        #[tokio::test]
        async fn test_duplicate_reactor_counted_once() {
            let mut h = Harness::new().await;
            let anchor = open_vote(&mut h, vec![dave()]).await;
            h.react(anchor, vec![alice(), alice(), bob()]).await.unwrap();
            assert!(h.kicks().is_empty());
        }

        #[tokio::test]
        async fn test_replayed_reaction_is_noop() {
            let mut h = Harness::new().await;
            let anchor = open_vote(&mut h, vec![dave()]).await;
            h.react(anchor, vec![alice(), bob(), carol()]).await.unwrap();
            h.react(anchor, vec![alice(), bob(), carol()]).await.unwrap();
            assert_eq!(h.kicks(), vec![5]);
        }

        #[tokio::test]
        async fn test_bots_are_never_subjects() {
            let mut h = Harness::new().await;
            h.command_with(500, &alice(), "kick", vec![Member::bot(7, "robot")])
                .await
                .unwrap();
            assert!(h.platform.actions().is_empty());
            assert!(h.session.approvals().is_empty());
        }

        #[tokio::test]
        async fn test_partial_failure_keeps_remaining_subjects() {
            let mut h = Harness::new().await;
            h.platform.fail_kick(carol().id);
            let anchor = open_vote(&mut h, vec![bob(), carol(), dave()]).await;

            h.react(anchor, vec![alice(), eve(), Member::new(8, "frank")])
                .await
                .unwrap();
            assert_eq!(h.kicks(), vec![3]);
            let pending = h.session.approvals().get(anchor).unwrap();
            assert_eq!(pending.subjects, vec![carol(), dave()]);

            // reported through the fault path
            assert!(h.sends_to(MAIN).iter().any(|t| t.starts_with("MAOUUUUU")));
            assert!(h.sends_to(DEBUG).iter().any(|t| t.contains("carol")));

            // a later evaluation retries only what is left
            h.react(anchor, vec![alice(), eve(), Member::new(8, "frank")])
                .await
                .unwrap();
            assert_eq!(h.kicks(), vec![3]);
        }
    }

    // ── Grodle ─────────────────────────────────────────────────

    mod grodle {
        use super::*;
        use grocha_game::Feedback::{Absent, Correct, Present};
        use grocha_game::render;

        #[tokio::test]
        async fn test_propose_guess_and_win() {
            let mut h = Harness::new().await;
            h.command(600, &alice(), "grodle ||alarm||").await.unwrap();

            let actions = h.platform.actions();
            assert_eq!(
                actions[0],
                Action::Delete {
                    message: MessageRef::new(MAIN, 600)
                }
            );
            assert_eq!(
                h.platform.last_text().as_deref(),
                Some(
                    ":mag: <@2> propose un nouveau mot de 5 lettres à deviner ! Je l'ai trouvé dans le dictionnaire !"
                )
            );
            assert!(h.backend.raw(GUILD).unwrap().contains("ALARM"));

            h.command(601, &bob(), "grodle llama").await.unwrap();
            let reply = h.platform.last_text().unwrap();
            assert!(reply.starts_with(":disappointed: LLAMA n'est pas le bon mot !\n"));
            assert!(reply.ends_with(&render::squares(&[
                Absent, Correct, Correct, Present, Present
            ])));

            h.command(602, &bob(), "grodle Alarm").await.unwrap();
            let reply = h.platform.last_text().unwrap();
            assert!(reply.starts_with(":tada: Bien joué <@3> !\n"));
            assert!(reply.contains("(<https://dico.test/wiki/alarm>)"));
            assert!(reply.ends_with("`@Grocha grodle ||mot||`"));
            assert!(!h.session.grodle().is_active());
            assert!(!h.backend.raw(GUILD).unwrap().contains("grodle"));
        }

        #[tokio::test]
        async fn test_failed_save_rolls_back_proposal() {
            let mut h = Harness::new().await;
            h.backend.fail_saves(true);
            h.command(600, &alice(), "grodle alarm").await.unwrap();
            assert!(!h.session.grodle().is_active());
            assert!(h.sends_to(MAIN).iter().any(|t| t.starts_with("MAOUUUUU")));
            assert!(h.backend.raw(GUILD).is_none());

            h.backend.fail_saves(false);
            h.command(601, &alice(), "grodle alarm").await.unwrap();
            assert!(h.session.grodle().is_active());
            assert!(h.backend.raw(GUILD).unwrap().contains("ALARM"));
        }

        #[tokio::test]
        async fn test_unknown_word_announced() {
            let mut h = Harness::new().await;
            h.command(600, &alice(), "grodle zzz").await.unwrap();
            assert!(
                h.platform
                    .last_text()
                    .unwrap()
                    .ends_with(" Je ne l'ai pas trouvé dans le dictionnaire...")
            );
        }

        #[tokio::test]
        async fn test_hint_when_no_word_given() {
            let mut h = Harness::new().await;
            h.command(600, &alice(), "grodle alarm").await.unwrap();
            h.command(601, &bob(), "grodle").await.unwrap();
            assert!(
                h.platform
                    .last_text()
                    .unwrap()
                    .starts_with(":ledger: Voici les lettres connues pour le moment :")
            );
        }

        #[tokio::test]
        async fn test_needs_single_word() {
            let mut h = Harness::new().await;
            h.command(600, &alice(), "grodle").await.unwrap();
            assert_eq!(h.platform.last_text().as_deref(), Some("Proposez un (seul) mot !"));
            h.command(601, &alice(), "grodle deux mots").await.unwrap();
            assert_eq!(h.platform.last_text().as_deref(), Some("Proposez un (seul) mot !"));
        }

        #[tokio::test]
        async fn test_bad_input_is_a_direct_reply() {
            let mut h = Harness::new().await;
            h.command(600, &alice(), "grodle abc1").await.unwrap();
            assert_eq!(
                h.platform.last_text().as_deref(),
                Some("Le mot contient des caractères interdits")
            );

            h.command(601, &alice(), "grodle alarm").await.unwrap();
            h.command(602, &bob(), "grodle chat").await.unwrap();
            assert_eq!(
                h.platform.last_text().as_deref(),
                Some(":confused: Le mot actuel contient 5 lettres !")
            );
            assert!(h.sends_to(DEBUG).is_empty());
        }

        #[tokio::test]
        async fn test_word_survives_reopen() {
            let mut h = Harness::new().await;
            h.command(600, &alice(), "grodle alarm").await.unwrap();
            let reopened = GuildSession::open(GUILD, h.ctx.clone()).await.unwrap();
            assert!(reopened.grodle().is_active());
        }
    }

    // ── Autoreact ──────────────────────────────────────────────

    mod autoreact {
        use super::*;

        fn chatter(id: MessageId, text: &str) -> PlatformEvent {
            message(id, &bob(), text, vec![])
        }

        #[tokio::test]
        async fn test_failed_save_rolls_back_table() {
            let mut h = Harness::new().await;
            h.backend.fail_saves(true);
            h.command(500, &alice(), "autoreact chat <:cat:45>")
                .await
                .unwrap();
            assert!(h.session.autoreact().is_empty());
            assert!(h.backend.raw(GUILD).is_none());
        }

        #[tokio::test]
        async fn test_register_persist_and_react() {
            let mut h = Harness::new().await;
            h.ctx.config.write().autoreact.probability = 1.0;
            h.command(500, &alice(), "autoreact chat <:cat:45> 🐱")
                .await
                .unwrap();
            assert_eq!(h.session.autoreact().react_candidates("chat").len(), 2);
            assert!(h.backend.raw(GUILD).unwrap().contains("<:cat:45>"));

            h.platform.clear_actions();
            h.handle(chatter(501, "Mon CHAT dort")).await.unwrap();
            let reacted: Vec<EmojiRef> = h
                .platform
                .actions()
                .into_iter()
                .filter_map(|a| match a {
                    Action::React { emoji, .. } => Some(emoji),
                    _ => None,
                })
                .collect();
            assert_eq!(reacted.len(), 2);
        }

        #[tokio::test]
        async fn test_zero_probability_never_reacts() {
            let mut h = Harness::new().await;
            h.ctx.config.write().autoreact.probability = 0.0;
            h.command(500, &alice(), "autoreact chat 🐱").await.unwrap();
            h.platform.clear_actions();
            h.handle(chatter(501, "chat chat chat")).await.unwrap();
            assert!(h.platform.actions().is_empty());
        }

        #[tokio::test]
        async fn test_unknown_custom_emoji_rejected() {
            let mut h = Harness::new().await;
            h.command(500, &alice(), "autoreact chien <:ghost:99>")
                .await
                .unwrap();
            assert!(h.session.autoreact().react_candidates("chien").is_empty());
            // the word still gets an (empty) entry
            assert_eq!(h.session.autoreact().len(), 1);
        }

        #[tokio::test]
        async fn test_remove_and_digest() {
            let mut h = Harness::new().await;
            h.command(500, &alice(), "autoreact chat 🐱 <:cat:45>")
                .await
                .unwrap();
            h.command(501, &alice(), "autoreact remove chat 🐱")
                .await
                .unwrap();
            assert_eq!(h.session.autoreact().react_candidates("chat").len(), 1);

            h.command(502, &alice(), "autoreact").await.unwrap();
            assert_eq!(
                h.platform.last_text().as_deref(),
                Some("MAOW-toreacts :\n`chat` → <:cat:45>\n")
            );
        }
    }

    // ── Faults ─────────────────────────────────────────────────

    mod faults {
        use super::*;

        #[tokio::test]
        async fn test_hurt_reports_in_report_mode() {
            let mut h = Harness::new().await;
            h.command(500, &alice(), "hurt").await.unwrap();
            assert_eq!(
                h.sends_to(MAIN),
                vec![
                    "MAOUUUUU :frowning:\n_(je suis cassé! Regarde #debug pour plus d'infos sur le problème)_"
                ]
            );
            let diagnostics = h.sends_to(DEBUG);
            assert_eq!(diagnostics.len(), 1);
            assert!(diagnostics[0].starts_with("_Le bobo de Grocha :_\n```"));
            assert!(diagnostics[0].contains("se prend une porte"));
        }

        #[tokio::test]
        async fn test_hurt_propagates_in_propagate_mode() {
            let mut h = Harness::new().await;
            h.ctx.config.write().runtime.fault_mode = FaultMode::Propagate;
            let err = h.command(500, &alice(), "hurt").await.unwrap_err();
            assert!(matches!(err, GrochaError::Fault(_)));
            assert!(h.platform.actions().is_empty());

            // switched back live
            h.ctx.config.write().runtime.fault_mode = FaultMode::Report;
            h.command(501, &alice(), "hurt").await.unwrap();
            assert_eq!(h.sends_to(DEBUG).len(), 1);
        }

        #[test]
        fn test_diagnostics_fit_one_message() {
            let err = GrochaError::Fault("x".repeat(5000));
            let text = FaultHandler::diagnostics(&err);
            assert!(text.chars().count() <= 2000);
            assert!(text.ends_with("```"));
        }
    }

    // ── Information commands ───────────────────────────────────

    mod info {
        use super::*;
        use chrono::TimeZone;
        use chrono_tz::Europe::Paris;

        #[test]
        fn test_weekend_wait() {
            let tuesday = Paris.with_ymd_and_hms(2024, 1, 2, 10, 30, 15).unwrap();
            let wait = weekend_wait(&tuesday);
            assert_eq!(format_wait(wait), "3 jours, 7:29:45");

            let friday = Paris.with_ymd_and_hms(2024, 1, 5, 17, 30, 0).unwrap();
            assert_eq!(format_wait(weekend_wait(&friday)), "0:30:00");

            let saturday = Paris.with_ymd_and_hms(2024, 1, 6, 9, 0, 0).unwrap();
            assert!(weekend_wait(&saturday) <= chrono::Duration::zero());
        }

        #[test]
        fn test_parse_city() {
            assert_eq!(
                parse_city("<@1> météo à Saint-Étienne, Loire exact").as_deref(),
                Some("Saint-Étienne, Loire")
            );
            assert_eq!(parse_city("<@1> meteo").as_deref(), None);
        }

        #[tokio::test]
        async fn test_meteo_default_and_named_city() {
            let mut h = Harness::new().await;
            h.command(500, &alice(), "meteo").await.unwrap();
            assert!(h.platform.last_text().unwrap().contains("En ce moment à Paris"));

            h.command(501, &alice(), "météo à Lyon exact").await.unwrap();
            let reply = h.platform.last_text().unwrap();
            assert!(reply.starts_with("MAOU-téo:"));
            assert!(reply.contains("En ce moment à Lyon, FR"));
            assert_eq!(
                *h.weather.requests.lock(),
                vec![(48.85341, 2.3488), (45.75, 4.85)]
            );
        }

        #[tokio::test]
        async fn test_meteo_unknown_city() {
            let mut h = Harness::new().await;
            h.command(500, &alice(), "meteo à Atlantis").await.unwrap();
            assert_eq!(
                h.platform.last_text().as_deref(),
                Some(":disappointed: Je ne connais pas de ville nommée Atlantis")
            );
        }

        #[tokio::test]
        async fn test_revolution_and_version() {
            let mut h = Harness::new().await;
            h.command(500, &alice(), "revolution").await.unwrap();
            let reply = h.platform.last_text().unwrap();
            assert!(reply.starts_with("MAOU! <:com:44>\n```\nUn spectre hante l'Europe"));

            h.command(501, &alice(), "version").await.unwrap();
            assert_eq!(
                h.platform.last_text().as_deref(),
                Some("MAOU :date:\nSha1: `0123456789abcdef`\nDate: `Mon Jan 1 12:00:00 2024 +0100`")
            );
        }

        #[tokio::test]
        async fn test_profile_lists_ran_commands() {
            let mut h = Harness::new().await;
            h.command(500, &alice(), "lick").await.unwrap();
            h.command(501, &alice(), "profile").await.unwrap();
            let reply = h.platform.last_text().unwrap();
            assert!(reply.starts_with("Profile:\nLick : "));
            assert!(h.session.profiler().average("lick").is_some());
        }

        #[tokio::test]
        async fn test_update_and_restart() {
            let mut h = Harness::new().await;
            h.command(500, &alice(), "update").await.unwrap();
            assert_eq!(
                h.platform.last_text().as_deref(),
                Some("MAOU! _(updating myself!)_\n**Results**\n```Already up to date.```")
            );
            h.command(501, &alice(), "restart").await.unwrap();
            assert_eq!(
                h.platform.last_text().as_deref(),
                Some("MAOU~ _(takin a short nap bruh)_")
            );
            assert_eq!(*h.ops.restarts.lock(), 1);
        }
    }

    // ── Emoji statistics ───────────────────────────────────────

    mod emojis {
        use super::*;

        #[test]
        fn test_tally_ranking() {
            let directory = vec![
                CustomEmoji::new(42, "grant"),
                CustomEmoji::new(45, "cat"),
                CustomEmoji::new(46, "dog"),
            ];
            let mut tally = EmojiTally::new(&directory);
            tally.count_text("<:cat:45> hi <:cat:45> <:grant:42>");
            tally.add(&EmojiRef::from(&directory[1]), 1);
            tally.add(&EmojiRef::parse("🐱").unwrap(), 5);
            assert_eq!(tally.score("cat"), Some(3));
            assert_eq!(
                tally.render(true),
                "E-MAOU-jis :\n<:cat:45>`3`-<:grant:42>`1`"
            );
            assert!(tally.render(false).starts_with("E-MAOU-jis : (calcul en cours)\n"));
        }

        #[tokio::test]
        async fn test_scan_counts_text_and_reactions() {
            let mut h = Harness::new().await;
            let cat = EmojiRef::from(&CustomEmoji::new(45, "cat"));
            let past = MessageRef::new(MAIN, 50);
            h.platform.add_history(
                MAIN,
                HistoryMessage {
                    message: past,
                    author: alice(),
                    content: "<:cat:45> <:cat:45> <:grant:42>".into(),
                    reactions: vec![ReactionCount {
                        emoji: cat.clone(),
                        count: 2,
                    }],
                },
            );
            h.platform.set_reactors(past.id, &cat, vec![bob(), bot()]);
            h.platform.add_history(
                RANDOM,
                HistoryMessage {
                    message: MessageRef::new(RANDOM, 51),
                    author: bob(),
                    content: "<:cat:45>".into(),
                    reactions: vec![],
                },
            );

            h.command(500, &alice(), "emojis ici").await.unwrap();
            let texts = h.platform.texts();
            assert_eq!(texts[0], "E-MAOU-jis...");
            assert_eq!(
                texts.last().map(String::as_str),
                Some("E-MAOU-jis :\n<:cat:45>`3`-<:grant:42>`1`")
            );

            // every text channel, only bob counted
            h.command_with(501, &alice(), "emojis <@3>", vec![bob()])
                .await
                .unwrap();
            assert_eq!(
                h.platform.last_text().as_deref(),
                Some("E-MAOU-jis :\n<:cat:45>`2`")
            );
        }
    }

    // ── Session manager and runtime loop ───────────────────────

    mod manager {
        use super::*;

        fn context(platform: Arc<MockPlatform>) -> SessionContext {
            SessionContext {
                platform,
                backend: Arc::new(InMemoryBackend::new()),
                weather: Arc::new(MockWeather::new(forecast())),
                dictionary: Arc::new(MockDictionary::new()),
                ops: Arc::new(MockOperations::default()),
                config: Arc::new(RwLock::new(GrochaConfig::default())),
                rng_seed: Some(3),
            }
        }

        #[tokio::test]
        async fn test_same_handle_per_guild() {
            let manager = SessionManager::new(context(Arc::new(platform())));
            assert!(manager.is_empty());
            let first = manager.get_or_open(GUILD).await.unwrap();
            let second = manager.get_or_open(GUILD).await.unwrap();
            assert!(Arc::ptr_eq(&first, &second));
            assert_eq!(manager.guilds(), vec![GUILD]);
            assert!(manager.get(GUILD).is_some());
        }

        #[tokio::test]
        async fn test_failed_open_leaves_no_session() {
            let manager = SessionManager::new(context(Arc::new(MockPlatform::new(bot()))));
            assert!(manager.get_or_open(GUILD).await.is_err());
            assert!(manager.get(GUILD).is_none());
            assert!(manager.is_empty());
            manager.handle(PlatformEvent::Connected).await.unwrap();
        }

        #[tokio::test]
        async fn test_runtime_processes_then_drains() {
            let platform = Arc::new(platform());
            let events = platform.start().await.unwrap();
            let runtime = GuildRuntime::new(context(platform.clone()));
            let manager = runtime.manager();
            let task = tokio::spawn(runtime.run(events, std::future::pending()));

            platform.emit(PlatformEvent::Connected).await.unwrap();
            platform
                .emit(message(500, &alice(), "<@1> lick", vec![bot()]))
                .await
                .unwrap();
            platform
                .emit(message(501, &alice(), "<@1> kezako", vec![bot()]))
                .await
                .unwrap();
            platform.stop().await.unwrap();

            task.await.unwrap().unwrap();
            assert_eq!(
                platform.texts(),
                vec!["<:lick:43> <@2> <:lick:43>".to_string(), "MAOU?".to_string()]
            );
            assert_eq!(manager.guilds(), vec![GUILD]);
        }

        #[tokio::test]
        async fn test_busy_guild_does_not_stall_others() {
            let platform = Arc::new(platform());
            let events = platform.start().await.unwrap();
            let runtime = GuildRuntime::new(context(platform.clone()));
            let manager = runtime.manager();
            let task = tokio::spawn(runtime.run(events, std::future::pending()));

            // Hold the first guild's session so its worker cannot progress.
            let busy = manager.get_or_open(GUILD).await.unwrap();
            let held = busy.lock().await;
            for id in 0..400 {
                platform
                    .emit(message(1000 + id, &bob(), "bonjour", vec![]))
                    .await
                    .unwrap();
            }

            let other = PlatformEvent::Message(IncomingMessage {
                guild: 200,
                message: MessageRef::new(RANDOM, 2000),
                author: alice(),
                content: "<@1> kezako".into(),
                mentions: vec![bot()],
                channel_mentions: vec![],
                mentions_everyone: false,
                reply_to_author: None,
            });
            platform.emit(other).await.unwrap();

            let answered = tokio::time::timeout(std::time::Duration::from_secs(5), async {
                while !platform.texts().contains(&"MAOU?".to_string()) {
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
            })
            .await;
            assert!(answered.is_ok());

            drop(held);
            platform.stop().await.unwrap();
            task.await.unwrap().unwrap();
            assert_eq!(manager.guilds(), vec![GUILD, 200]);
        }
    }
}
