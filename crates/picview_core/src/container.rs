//! Wiring of the stores, strategies, use cases and view models.

use std::sync::Arc;

use crate::classifier::ClassifierSet;
use crate::config::{AppSettings, ClassifierConfig};
use crate::fs::{DirectoryLister, FileSystem, MetadataProbe};
use crate::repository::{
    ClassificationStore, FolderRepository, ImageRepository, InMemoryClassificationStore,
    InMemoryFolderRepository, InMemoryImageRepository,
};
use crate::usecase::{BrowseFolderUseCase, ClassifyImageUseCase, ViewImageUseCase};
use crate::viewmodel::{ClassificationViewModel, ImageViewModel, MainWindowViewModel};

/// Owns one instance of every store and use case. View models handed out by
/// the container share those instances.
pub struct AppContainer {
    settings: AppSettings,
    images: Arc<dyn ImageRepository>,
    folders: Arc<dyn FolderRepository>,
    classifications: Arc<dyn ClassificationStore>,
    browse: Arc<BrowseFolderUseCase>,
    view: Arc<ViewImageUseCase>,
    classify: Arc<ClassifyImageUseCase>,
}

impl AppContainer {
    /// Wires the local filesystem and the three strategies built from
    /// `classifier_config`. No model is loaded here.
    pub fn new(settings: AppSettings, classifier_config: ClassifierConfig) -> Self {
        let fs = Arc::new(FileSystem::new());
        let classifiers = ClassifierSet::new(&classifier_config);
        Self::from_parts(settings, fs.clone(), fs, classifiers)
    }

    /// Wires custom collaborators, e.g. stub backends.
    pub fn from_parts(
        settings: AppSettings,
        probe: Arc<dyn MetadataProbe>,
        lister: Arc<dyn DirectoryLister>,
        classifiers: ClassifierSet,
    ) -> Self {
        let images: Arc<dyn ImageRepository> =
            Arc::new(InMemoryImageRepository::new(probe, lister.clone()));
        let folders: Arc<dyn FolderRepository> = Arc::new(InMemoryFolderRepository::new(lister));
        let classifications: Arc<dyn ClassificationStore> =
            Arc::new(InMemoryClassificationStore::new());

        let browse = Arc::new(BrowseFolderUseCase::new(folders.clone(), images.clone()));
        let view = Arc::new(ViewImageUseCase::new(images.clone()));
        let classify = Arc::new(ClassifyImageUseCase::new(
            images.clone(),
            classifications.clone(),
            Arc::new(classifiers),
        ));
        tracing::debug!(
            "container ready, default classifier {}",
            settings.default_classifier
        );

        Self {
            settings,
            images,
            folders,
            classifications,
            browse,
            view,
            classify,
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn images(&self) -> Arc<dyn ImageRepository> {
        self.images.clone()
    }

    pub fn folders(&self) -> Arc<dyn FolderRepository> {
        self.folders.clone()
    }

    pub fn classifications(&self) -> Arc<dyn ClassificationStore> {
        self.classifications.clone()
    }

    pub fn browse_folder(&self) -> Arc<BrowseFolderUseCase> {
        self.browse.clone()
    }

    pub fn view_image(&self) -> Arc<ViewImageUseCase> {
        self.view.clone()
    }

    pub fn classify_image(&self) -> Arc<ClassifyImageUseCase> {
        self.classify.clone()
    }

    pub fn main_window_view_model(&self) -> MainWindowViewModel {
        MainWindowViewModel::new(self.browse.clone())
    }

    pub fn image_view_model(&self) -> ImageViewModel {
        ImageViewModel::new(self.view.clone())
    }

    pub fn classification_view_model(&self) -> ClassificationViewModel {
        ClassificationViewModel::new(self.classify.clone())
    }
}
