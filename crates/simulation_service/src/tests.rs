
// Router properties checked across the local router, the hybrid router and
// the remote transport together.
#[cfg(test)]
mod tests {
    use crate::*;
    use async_trait::async_trait;
    use grid_types::{
        AgentCircuitData, AgentData, AgentId, AgentPosition, EntityTransferContext, GridRegion,
        ObjectHandoff, ProtocolVersion, RegionId, RegionInfo, SceneObject, TeleportFlags, Vector3,
    };
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    #[derive(Debug, Clone, PartialEq)]
    enum SceneCall {
        NewUserConnection(AgentId),
        UpdateAgent(AgentId),
        UpdatePosition(AgentId),
        QueryAccess(AgentId),
        Release(AgentId),
        Close(AgentId, String),
        CreateObject(Uuid),
    }

    /// Hosted instance that records every entry point it sees.
    struct SpyScene {
        info: RegionInfo,
        calls: Mutex<Vec<SceneCall>>,
        objects: Mutex<Vec<Arc<SceneObject>>>,
        holds: Option<AgentId>,
        refusal: Option<String>,
        panics: bool,
    }

    impl SpyScene {
        fn new(name: &str, grid_x: u32) -> Self {
            Self {
                info: RegionInfo::new(RegionId::new(), name, grid_x, 1000),
                calls: Mutex::new(Vec::new()),
                objects: Mutex::new(Vec::new()),
                holds: None,
                refusal: None,
                panics: false,
            }
        }

        fn holding(mut self, agent_id: AgentId) -> Self {
            self.holds = Some(agent_id);
            self
        }

        fn refusing(mut self, reason: &str) -> Self {
            self.refusal = Some(reason.to_string());
            self
        }

        fn panicking(mut self) -> Self {
            self.panics = true;
            self
        }

        fn grid_region(&self) -> GridRegion {
            GridRegion::try_from(&self.info).unwrap()
        }

        fn record(&self, call: SceneCall) {
            self.calls.lock().unwrap().push(call);
            if self.panics {
                panic!("scene exploded");
            }
        }

        fn calls(&self) -> Vec<SceneCall> {
            self.calls.lock().unwrap().clone()
        }

        fn admit(&self) -> Result<(), SceneError> {
            match &self.refusal {
                Some(reason) => Err(SceneError::Refused(reason.clone())),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl SceneHandle for SpyScene {
        fn region_info(&self) -> &RegionInfo {
            &self.info
        }

        async fn new_user_connection(
            &self,
            circuit: &AgentCircuitData,
            _teleport_flags: TeleportFlags,
            _source: Option<&GridRegion>,
        ) -> Result<(), SceneError> {
            self.record(SceneCall::NewUserConnection(circuit.agent_id));
            self.admit()
        }

        async fn incoming_update_agent(
            &self,
            data: &AgentData,
            _ctx: &EntityTransferContext,
        ) -> bool {
            self.record(SceneCall::UpdateAgent(data.agent_id));
            self.refusal.is_none()
        }

        async fn incoming_update_agent_position(&self, position: &AgentPosition) -> bool {
            self.record(SceneCall::UpdatePosition(position.agent_id));
            self.holds == Some(position.agent_id)
        }

        async fn query_access(
            &self,
            agent_id: AgentId,
            _agent_home_uri: &str,
            _via_teleport: bool,
            _position: Vector3,
            _features: &[Uuid],
        ) -> Result<(), SceneError> {
            self.record(SceneCall::QueryAccess(agent_id));
            self.admit()
        }

        async fn incoming_release_agent(&self, agent_id: AgentId) -> bool {
            self.record(SceneCall::Release(agent_id));
            true
        }

        async fn incoming_close_agent(&self, agent_id: AgentId, auth_token: &str) -> bool {
            self.record(SceneCall::Close(agent_id, auth_token.to_string()));
            true
        }

        async fn incoming_create_object(
            &self,
            _position: Vector3,
            object: Arc<SceneObject>,
        ) -> bool {
            self.record(SceneCall::CreateObject(object.id));
            self.objects.lock().unwrap().push(object);
            true
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum RemoteCall {
        CreateAgent {
            source: Option<RegionId>,
            destination: RegionId,
            agent_id: AgentId,
            teleport_flags: TeleportFlags,
            outbound_version: ProtocolVersion,
        },
        UpdateAgent {
            destination: RegionId,
            agent_id: AgentId,
        },
        QueryAccess {
            destination: RegionId,
            agent_id: AgentId,
            home_uri: String,
            via_teleport: bool,
            position: Vector3,
            features: Vec<Uuid>,
        },
        ReleaseAgent {
            origin_id: RegionId,
            agent_id: AgentId,
            uri: String,
        },
        CloseAgent {
            destination: RegionId,
            agent_id: AgentId,
            auth_token: String,
        },
        CreateObject {
            destination: RegionId,
            position: Vector3,
            object_id: Uuid,
        },
    }

    /// Remote transport that records calls and always succeeds.
    #[derive(Default)]
    struct SpyTransport {
        calls: Mutex<Vec<RemoteCall>>,
        objects: Mutex<Vec<Arc<SceneObject>>>,
    }

    impl SpyTransport {
        fn calls(&self) -> Vec<RemoteCall> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: RemoteCall) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl RemoteTransport for SpyTransport {
        async fn create_agent(
            &self,
            source: Option<&GridRegion>,
            destination: &GridRegion,
            circuit: &AgentCircuitData,
            teleport_flags: TeleportFlags,
            ctx: &EntityTransferContext,
        ) -> Result<(), SimulationError> {
            self.record(RemoteCall::CreateAgent {
                source: source.map(|s| s.region_id),
                destination: destination.region_id,
                agent_id: circuit.agent_id,
                teleport_flags,
                outbound_version: ctx.outbound_version,
            });
            Ok(())
        }

        async fn update_agent(
            &self,
            destination: &GridRegion,
            data: &AgentData,
            _ctx: &EntityTransferContext,
        ) -> bool {
            self.record(RemoteCall::UpdateAgent {
                destination: destination.region_id,
                agent_id: data.agent_id,
            });
            true
        }

        async fn query_access(
            &self,
            destination: &GridRegion,
            agent_id: AgentId,
            agent_home_uri: &str,
            via_teleport: bool,
            position: Vector3,
            features: &[Uuid],
            _ctx: &EntityTransferContext,
        ) -> Result<(), SimulationError> {
            self.record(RemoteCall::QueryAccess {
                destination: destination.region_id,
                agent_id,
                home_uri: agent_home_uri.to_string(),
                via_teleport,
                position,
                features: features.to_vec(),
            });
            Ok(())
        }

        async fn release_agent(&self, origin_id: RegionId, agent_id: AgentId, uri: &str) -> bool {
            self.record(RemoteCall::ReleaseAgent {
                origin_id,
                agent_id,
                uri: uri.to_string(),
            });
            true
        }

        async fn close_agent(
            &self,
            destination: &GridRegion,
            agent_id: AgentId,
            auth_token: &str,
        ) -> bool {
            self.record(RemoteCall::CloseAgent {
                destination: destination.region_id,
                agent_id,
                auth_token: auth_token.to_string(),
            });
            true
        }

        async fn create_object(
            &self,
            destination: &GridRegion,
            position: Vector3,
            object: ObjectHandoff,
        ) -> bool {
            self.record(RemoteCall::CreateObject {
                destination: destination.region_id,
                position,
                object_id: object.object().id,
            });
            self.objects.lock().unwrap().push(object.into_destination_object());
            true
        }
    }

    fn router(scenes: &[Arc<SpyScene>]) -> (HybridSimulationConnector, Arc<SpyTransport>) {
        let local = Arc::new(LocalSimulationConnector::new(ServiceConfig::default()));
        for scene in scenes {
            local.add_region(scene.clone()).unwrap();
        }
        let remote = Arc::new(SpyTransport::default());
        (HybridSimulationConnector::new(local, remote.clone()), remote)
    }

    fn remote_region() -> GridRegion {
        let mut region = GridRegion::new(RegionId::new(), "Far Shore");
        region.external_host_name = "far-shore.example.org".to_string();
        region.http_port = 9000;
        region
    }

    fn position_update(agent_id: AgentId) -> AgentPosition {
        AgentPosition::new(agent_id, Uuid::new_v4(), 0, Vector3::new(64.0, 64.0, 22.0))
    }

    #[tokio::test]
    async fn test_hosted_regions_never_reach_remote() {
        let scene = Arc::new(SpyScene::new("Alpha", 1000));
        let (router, remote) = router(&[scene.clone()]);
        let region = scene.grid_region();
        let agent_id = AgentId::new();
        let circuit = AgentCircuitData::new(agent_id, "Ada", "Lovelace");
        let data = AgentData::new(agent_id, region.region_id, circuit.session_id, Vector3::ZERO);
        let ctx = EntityTransferContext::default();
        let position = Vector3::new(128.0, 128.0, 30.0);
        let object = Arc::new(SceneObject::new("Crate", agent_id, position));

        let via_router = router
            .create_agent(None, Some(&region), &circuit, TeleportFlags::VIA_LOCATION, &ctx)
            .await;
        let direct = router
            .get_inner_service()
            .create_agent(None, Some(&region), &circuit, TeleportFlags::VIA_LOCATION, &ctx)
            .await;
        assert_eq!(via_router, direct);

        assert!(router.update_agent(Some(&region), &data, &ctx).await);
        assert_eq!(
            router.query_access(Some(&region), agent_id, "", true, position, &[], &ctx).await,
            Ok(())
        );
        assert!(router.release_agent(region.region_id, agent_id, &region.server_uri()).await);
        assert!(router.close_agent(Some(&region), agent_id, "token").await);
        assert!(router.create_object(Some(&region), position, ObjectHandoff::Remote(object)).await);

        assert!(remote.calls().is_empty());
        assert_eq!(scene.calls().len(), 7);
        assert!(router.is_local_region(region.region_id));
        assert_eq!(router.stats().snapshot().remote_dispatches, 0);
    }

    #[tokio::test]
    async fn test_unhosted_regions_go_remote_once_with_arguments_intact() {
        let scene = Arc::new(SpyScene::new("Alpha", 1000));
        let (router, remote) = router(&[scene.clone()]);
        let source = scene.grid_region();
        let destination = remote_region();
        let agent_id = AgentId::new();
        let circuit = AgentCircuitData::new(agent_id, "Grace", "Hopper");
        let data =
            AgentData::new(agent_id, destination.region_id, circuit.session_id, Vector3::ZERO);
        let ctx = EntityTransferContext::with_version(ProtocolVersion::new(0, 5));
        let position = Vector3::new(10.0, 20.0, 30.0);
        let features = vec![Uuid::new_v4(), Uuid::new_v4()];
        let home_uri = "http://home.example.org/";
        let release_uri = "http://far-shore.example.org:9000/";
        let object = Arc::new(SceneObject::new("Glider", agent_id, position));

        let flags = TeleportFlags::VIA_LANDMARK | TeleportFlags::IS_FLYING;
        assert_eq!(
            router.create_agent(Some(&source), Some(&destination), &circuit, flags, &ctx).await,
            Ok(())
        );
        assert!(router.update_agent(Some(&destination), &data, &ctx).await);
        let access = router
            .query_access(Some(&destination), agent_id, home_uri, false, position, &features, &ctx)
            .await;
        assert_eq!(access, Ok(()));
        assert!(router.release_agent(destination.region_id, agent_id, release_uri).await);
        assert!(router.close_agent(Some(&destination), agent_id, "secret").await);
        let handoff = ObjectHandoff::Remote(object.clone());
        assert!(router.create_object(Some(&destination), position, handoff).await);

        assert_eq!(
            remote.calls(),
            vec![
                RemoteCall::CreateAgent {
                    source: Some(source.region_id),
                    destination: destination.region_id,
                    agent_id,
                    teleport_flags: flags,
                    outbound_version: ProtocolVersion::new(0, 5),
                },
                RemoteCall::UpdateAgent {
                    destination: destination.region_id,
                    agent_id,
                },
                RemoteCall::QueryAccess {
                    destination: destination.region_id,
                    agent_id,
                    home_uri: home_uri.to_string(),
                    via_teleport: false,
                    position,
                    features,
                },
                RemoteCall::ReleaseAgent {
                    origin_id: destination.region_id,
                    agent_id,
                    uri: release_uri.to_string(),
                },
                RemoteCall::CloseAgent {
                    destination: destination.region_id,
                    agent_id,
                    auth_token: "secret".to_string(),
                },
                RemoteCall::CreateObject {
                    destination: destination.region_id,
                    position,
                    object_id: object.id,
                },
            ]
        );
        assert!(scene.calls().is_empty());
        assert_eq!(router.stats().snapshot().remote_dispatches, 6);
    }

    #[tokio::test]
    async fn test_position_broadcast_reaches_all_scenes() {
        let agent_id = AgentId::new();
        let alpha = Arc::new(SpyScene::new("Alpha", 1000));
        let beta = Arc::new(SpyScene::new("Beta", 1001).holding(agent_id));
        let gamma = Arc::new(SpyScene::new("Gamma", 1002));
        let (router, remote) = router(&[alpha.clone(), beta.clone(), gamma.clone()]);

        // The named destination is not the scene holding the presence
        let named = alpha.grid_region();
        assert!(router.update_agent_position(Some(&named), &position_update(agent_id)).await);

        for scene in [&alpha, &beta, &gamma] {
            assert_eq!(scene.calls(), vec![SceneCall::UpdatePosition(agent_id)]);
        }

        // Nobody matching still reports delivery
        let stranger = AgentId::new();
        let update = position_update(stranger);
        assert!(router.update_agent_position(Some(&remote_region()), &update).await);
        assert!(remote.calls().is_empty());
        assert_eq!(router.stats().snapshot().broadcasts, 2);
    }

    #[tokio::test]
    async fn test_object_handoff_copies_local_and_adopts_remote() {
        let scene = Arc::new(SpyScene::new("Alpha", 1000));
        let (router, remote) = router(&[scene.clone()]);
        let region = scene.grid_region();
        let position = Vector3::new(30.0, 40.0, 21.0);

        let mut source_object = SceneObject::new("Lantern", AgentId::new(), position);
        source_object.local_id = 77;
        let neighbour_owned = Arc::new(source_object);
        let before = (*neighbour_owned).clone();

        let handoff = ObjectHandoff::Local(neighbour_owned.clone());
        assert!(router.create_object(Some(&region), position, handoff).await);
        let inserted = scene.objects.lock().unwrap()[0].clone();
        assert!(!Arc::ptr_eq(&inserted, &neighbour_owned));
        assert_eq!(inserted.id, neighbour_owned.id);
        assert_eq!(*neighbour_owned, before);

        let deserialized = Arc::new(SceneObject::new("Parcel", AgentId::new(), position));
        let handoff = ObjectHandoff::Remote(deserialized.clone());
        assert!(router.create_object(Some(&region), position, handoff).await);
        let adopted = scene.objects.lock().unwrap()[1].clone();
        assert!(Arc::ptr_eq(&adopted, &deserialized));

        let outbound = Arc::new(SceneObject::new("Kite", AgentId::new(), position));
        let handoff = ObjectHandoff::Remote(outbound.clone());
        assert!(router.create_object(Some(&remote_region()), position, handoff).await);
        let sent = remote.objects.lock().unwrap()[0].clone();
        assert!(Arc::ptr_eq(&sent, &outbound));
    }

    #[tokio::test]
    async fn test_variable_region_gate_overrides_admission() {
        let scene = Arc::new(SpyScene::new("Vast", 1000));
        let (router, remote) = router(&[scene.clone()]);
        let mut vast = scene.grid_region();
        vast.region_size_x = 512;
        vast.region_size_y = 512;
        let standard = scene.grid_region();
        let old = EntityTransferContext::with_version(ProtocolVersion::new(0, 2));
        let agent_id = AgentId::new();
        let position = Vector3::new(100.0, 100.0, 25.0);

        let refused = router
            .query_access(Some(&vast), agent_id, "", true, position, &[], &old)
            .await;
        let reason = refused.unwrap_err().reason();
        assert!(reason.contains("variable-sized region"));
        assert!(scene.calls().is_empty());

        assert_eq!(
            router.query_access(Some(&standard), agent_id, "", true, position, &[], &old).await,
            Ok(())
        );
        assert_eq!(scene.calls(), vec![SceneCall::QueryAccess(agent_id)]);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_destination_touches_nothing() {
        let scene = Arc::new(SpyScene::new("Alpha", 1000));
        let (router, remote) = router(&[scene.clone()]);
        let agent_id = AgentId::new();
        let circuit = AgentCircuitData::new(agent_id, "Ada", "Lovelace");
        let data = AgentData::new(agent_id, RegionId::ZERO, circuit.session_id, Vector3::ZERO);
        let ctx = EntityTransferContext::default();
        let object = Arc::new(SceneObject::new("Crate", agent_id, Vector3::ZERO));

        let created = router.create_agent(None, None, &circuit, TeleportFlags::empty(), &ctx).await;
        assert_eq!(created.unwrap_err().reason(), "destination unknown");
        assert!(!router.update_agent(None, &data, &ctx).await);
        assert!(!router.update_agent_position(None, &position_update(agent_id)).await);
        assert_eq!(
            router.query_access(None, agent_id, "", true, Vector3::ZERO, &[], &ctx).await,
            Err(SimulationError::DestinationUnknown)
        );
        assert!(!router.release_agent(RegionId::ZERO, agent_id, "http://somewhere/").await);
        assert!(!router.close_agent(None, agent_id, "").await);
        assert!(!router.create_object(None, Vector3::ZERO, ObjectHandoff::Local(object)).await);

        assert!(scene.calls().is_empty());
        assert!(remote.calls().is_empty());
        assert_eq!(router.stats().snapshot().rejected, 7);
    }

    #[tokio::test]
    async fn test_local_refusal_is_final() {
        let scene = Arc::new(SpyScene::new("Gated", 1000).refusing("You are banned from Gated"));
        let (router, remote) = router(&[scene.clone()]);
        let region = scene.grid_region();
        let circuit = AgentCircuitData::new(AgentId::new(), "Ada", "Lovelace");
        let ctx = EntityTransferContext::default();

        let result = router
            .create_agent(None, Some(&region), &circuit, TeleportFlags::VIA_LURE, &ctx)
            .await;
        assert_eq!(result, Err(SimulationError::Refused("You are banned from Gated".into())));

        let data = AgentData::new(
            circuit.agent_id,
            region.region_id,
            circuit.session_id,
            Vector3::ZERO,
        );
        assert!(!router.update_agent(Some(&region), &data, &ctx).await);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_scene_panic_is_contained() {
        let scene = Arc::new(SpyScene::new("Broken", 1000).panicking());
        let (router, remote) = router(&[scene.clone()]);
        let region = scene.grid_region();
        let circuit = AgentCircuitData::new(AgentId::new(), "Ada", "Lovelace");
        let ctx = EntityTransferContext::default();

        let result = router
            .create_agent(None, Some(&region), &circuit, TeleportFlags::empty(), &ctx)
            .await;
        match result {
            Err(SimulationError::SceneFault(message)) => assert_eq!(message, "scene exploded"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!router.close_agent(Some(&region), circuit.agent_id, "").await);

        // One panicking scene does not spoil the broadcast
        let update = position_update(circuit.agent_id);
        assert!(router.update_agent_position(Some(&region), &update).await);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_inner_service_bypasses_remote() {
        let (router, remote) = router(&[]);
        let destination = remote_region();
        let circuit = AgentCircuitData::new(AgentId::new(), "Ada", "Lovelace");
        let ctx = EntityTransferContext::default();

        let result = router
            .inner_service()
            .create_agent(None, Some(&destination), &circuit, TeleportFlags::empty(), &ctx)
            .await;
        assert_eq!(result, Err(SimulationError::RegionNotFound(destination.region_id)));
        let closed = router
            .inner_service()
            .close_agent(Some(&destination), circuit.agent_id, "")
            .await;
        assert!(!closed);
        assert!(remote.calls().is_empty());
        assert!(!router.is_local_region(destination.region_id));
    }

    #[tokio::test]
    async fn test_removed_region_falls_back_to_remote() {
        let scene = Arc::new(SpyScene::new("Leaving", 1000));
        let (router, remote) = router(&[scene.clone()]);
        let region = scene.grid_region();
        router.get_inner_service().remove_region(region.region_id).unwrap();

        assert!(router.close_agent(Some(&region), AgentId::new(), "").await);
        assert_eq!(remote.calls().len(), 1);
        assert!(scene.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_transport_reason_is_displayable() {
        let local = Arc::new(LocalSimulationConnector::new(ServiceConfig::default()));
        let guarded =
            GuardedTransport::new(Arc::new(UnreachableTransport), RemoteSettings::default());
        let router = HybridSimulationConnector::new(local, Arc::new(guarded));
        let circuit = AgentCircuitData::new(AgentId::new(), "Ada", "Lovelace");
        let ctx = EntityTransferContext::default();

        let result = router
            .create_agent(None, Some(&remote_region()), &circuit, TeleportFlags::empty(), &ctx)
            .await;
        let reason = result.unwrap_err().reason();
        assert!(reason.contains("no remote transport"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_routing_while_regions_come_and_go() {
        let local = Arc::new(LocalSimulationConnector::new(ServiceConfig::default()));
        let remote = Arc::new(SpyTransport::default());
        let router = Arc::new(HybridSimulationConnector::new(local.clone(), remote.clone()));
        let scenes: Vec<Arc<SpyScene>> = (0..8)
            .map(|i| Arc::new(SpyScene::new("Churn", 1000 + i)))
            .collect();

        let mut handles = Vec::new();
        for scene in scenes.iter().cloned() {
            let local = local.clone();
            let router = router.clone();
            handles.push(tokio::spawn(async move {
                let region = scene.grid_region();
                let agent_id = AgentId::new();
                local.add_region(scene.clone()).unwrap();
                assert!(router.close_agent(Some(&region), agent_id, "").await);
                local.remove_region(region.region_id).unwrap();
                assert!(router.close_agent(Some(&region), agent_id, "").await);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(remote.calls().len(), 8);
        for scene in &scenes {
            assert_eq!(scene.calls().len(), 1);
        }
        assert!(local.registry().is_empty());
    }
}
